//! Append-only record of filenames that have already been uploaded.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, Result};

/// Newline-delimited set of uploaded filenames, mirrored in memory.
#[derive(Debug)]
pub struct UploadLedger {
    path: PathBuf,
    entries: HashSet<String>,
}

impl UploadLedger {
    /// Open the ledger at `path`, creating an empty file if there is none.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::File::create(&path)?;
        }

        let entries = fs::read_to_string(&path)?
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Durably record `filename` as uploaded.
    ///
    /// Only call this once the upload has been confirmed.
    pub fn append(&mut self, filename: &str) -> Result<()> {
        if !is_recordable(filename) {
            return Err(SyncError::UnrecordableName(filename.to_string()));
        }
        if self.entries.contains(filename) {
            return Ok(());
        }

        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        writeln!(file, "{filename}")?;
        file.sync_data()?;

        self.entries.insert(filename.to_string());
        Ok(())
    }
}

/// Whether `filename` survives a round trip through the line-based format.
pub fn is_recordable(filename: &str) -> bool {
    !filename.is_empty() && !filename.contains(['\n', '\r'])
}
