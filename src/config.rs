//! Runtime settings and the persisted operator config record.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;
use tracing::warn;

use crate::auth::DriveScope;
use crate::error::Result;

pub const DEFAULT_CREDENTIALS_PATH: &str = "/workspace/credentials.json";
pub const DEFAULT_STATE_DIR: &str = "/workspace";
pub const DEFAULT_OUTPUTS_DIR: &str = "/workspace/stable-diffusion-webui/outputs";
pub const DEFAULT_MODEL_DIR: &str = "/workspace/stable-diffusion-webui/models/Stable-diffusion";
pub const DEFAULT_MODEL_FILE_NAME: &str = "model.safetensors";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

const CONFIG_FILE_NAME: &str = "config.json";
const LEDGER_FILE_NAME: &str = "copied_files.txt";
const TEMP_MODEL_FILE_NAME: &str = "temp_model.safetensors";

/// Subdirectory of the outputs root holding one folder per day.
const DATED_SUBDIR: &str = "txt2img-images";

/// How the directory to watch is derived from the outputs root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDir {
    /// Watch the root itself.
    Flat(PathBuf),
    /// Watch `<root>/txt2img-images/<YYYY-MM-DD>` for the given day.
    Dated(PathBuf),
}

impl SourceDir {
    pub fn new(layout: SourceLayout, root: impl Into<PathBuf>) -> Self {
        match layout {
            SourceLayout::Flat => SourceDir::Flat(root.into()),
            SourceLayout::Dated => SourceDir::Dated(root.into()),
        }
    }

    /// The directory to scan on `date`.
    pub fn resolve(&self, date: Date) -> PathBuf {
        match self {
            SourceDir::Flat(root) => root.clone(),
            SourceDir::Dated(root) => {
                let day = date
                    .format(format_description!("[year]-[month]-[day]"))
                    .unwrap_or_else(|_| date.to_string());
                root.join(DATED_SUBDIR).join(day)
            }
        }
    }
}

/// Command-line spelling of a [`SourceDir`] strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    Dated,
    Flat,
}

impl FromStr for SourceLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dated" => Ok(SourceLayout::Dated),
            "flat" => Ok(SourceLayout::Flat),
            other => Err(format!("unknown layout '{other}', expected 'dated' or 'flat'")),
        }
    }
}

/// Everything the program needs to know about where things live.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials_path: PathBuf,
    /// Directory holding the config record, the ledger and the download temp file.
    pub state_dir: PathBuf,
    pub source: SourceDir,
    pub model_dir: PathBuf,
    pub model_file_name: String,
    pub poll_interval: Duration,
    pub scope: DriveScope,
}

impl Settings {
    pub fn config_path(&self) -> PathBuf {
        self.state_dir.join(CONFIG_FILE_NAME)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join(LEDGER_FILE_NAME)
    }

    pub fn temp_model_path(&self) -> PathBuf {
        self.state_dir.join(TEMP_MODEL_FILE_NAME)
    }
}

/// The operator-entered values kept between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub folder_id: String,
    pub api_key: String,
}

/// Reads and writes [`StoredConfig`] as a JSON file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved record.
    ///
    /// A missing file, unreadable JSON, or a record with an empty field all
    /// count as "not configured" and yield `None`.
    pub fn load(&self) -> Option<StoredConfig> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read config");
                return None;
            }
        };

        match serde_json::from_str::<StoredConfig>(&content) {
            Ok(config) if !config.folder_id.is_empty() && !config.api_key.is_empty() => {
                Some(config)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed config");
                None
            }
        }
    }

    /// Overwrite the saved record.
    pub fn save(&self, config: &StoredConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }
}
