//! Line-oriented prompts for first-run setup and the action menu.

use std::io::{self, BufRead, Write};

use crate::config::StoredConfig;
use crate::error::{SyncError, Result};
use crate::url_parser::extract_id;

const MENU: &str = "Choose an action:\n1. Download and Move a Model\n2. Copy Photos to Google Drive\nChoose 1 or 2: ";

/// The two things the program can do once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    FetchModel,
    SyncOutputs,
}

impl Action {
    /// Parse a menu answer. Anything but `1` or `2` is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim() {
            "1" => Ok(Action::FetchModel),
            "2" => Ok(Action::SyncOutputs),
            other => Err(SyncError::InvalidChoice(other.to_string())),
        }
    }
}

/// Asks questions on `output` and reads answers from `input`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and return the trimmed answer.
    ///
    /// End of input yields an empty answer.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    /// Ask for the Drive folder and API key.
    ///
    /// The folder may be given as a raw ID or as a Drive folder URL.
    pub fn ask_config(&mut self) -> Result<StoredConfig> {
        writeln!(
            self.output,
            "Configuration not found. Please provide the following details."
        )?;
        let folder = self.ask("Enter your Google Drive Folder ID: ")?;
        let folder_id = extract_id(&folder)?;
        let api_key = self.ask("Enter your API key for downloading models: ")?;
        if api_key.is_empty() {
            return Err(SyncError::MissingValue("An API key"));
        }

        Ok(StoredConfig { folder_id, api_key })
    }

    /// Everything written so far.
    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn choose_action(&mut self) -> Result<Action> {
        let answer = self.ask(MENU)?;
        Action::parse(&answer)
    }

    pub fn ask_model_url(&mut self) -> Result<String> {
        self.ask("Enter the URL to download the model: ")
    }
}
