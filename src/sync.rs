//! Polling loop that uploads new files from the source directory.
//!
//! Each cycle lists the source directory, subtracts everything already in
//! the [`UploadLedger`], and uploads what is left one file at a time. A file
//! is written to the ledger right after its upload succeeds, so a failed
//! upload is simply picked up again on the next cycle.

use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use time::{Date, OffsetDateTime, UtcOffset};
use tracing::{debug, error, info, warn};

use crate::client::DriveStore;
use crate::config::SourceDir;
use crate::error::Result;
use crate::ledger::{is_recordable, UploadLedger};
use crate::models::format_size;

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The source directory was missing or unreadable; nothing was touched.
    SourceMissing(PathBuf),
    /// The delta was processed. Both lists are in upload order.
    Synced {
        uploaded: Vec<String>,
        failed: Vec<String>,
    },
}

/// List the names of the regular files directly inside `dir`.
///
/// Names that cannot be stored in the ledger (not UTF-8, or containing a
/// line break) are skipped with a warning.
pub fn list_source_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) if is_recordable(&name) => names.push(name),
            Ok(name) => warn!(file = ?name, "skipping file whose name cannot be recorded"),
            Err(name) => warn!(file = ?name, "skipping file with non UTF-8 name"),
        }
    }

    Ok(names)
}

/// Files in `listing` that are not yet in `ledger`, sorted and deduplicated.
pub fn compute_delta(listing: &[String], ledger: &UploadLedger) -> Vec<String> {
    let mut delta: Vec<String> = listing
        .iter()
        .filter(|name| !ledger.contains(name))
        .cloned()
        .collect();
    delta.sort();
    delta.dedup();
    delta
}

/// Uploads new files from a source directory into one Drive folder.
pub struct SyncLoop<S> {
    store: S,
    source: SourceDir,
    folder_id: String,
    ledger: UploadLedger,
    interval: Duration,
    utc_offset: UtcOffset,
    /// Directory the last cycle resolved to.
    current: Option<PathBuf>,
    /// Earlier directory that still needs a final pass.
    draining: Option<PathBuf>,
}

impl<S: DriveStore> SyncLoop<S> {
    pub fn new(
        store: S,
        source: SourceDir,
        folder_id: impl Into<String>,
        ledger: UploadLedger,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            source,
            folder_id: folder_id.into(),
            ledger,
            interval,
            utc_offset: UtcOffset::UTC,
            current: None,
            draining: None,
        }
    }

    /// Offset used to decide "today" for date-qualified source directories.
    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn ledger(&self) -> &UploadLedger {
        &self.ledger
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn today(&self) -> Date {
        OffsetDateTime::now_utc().to_offset(self.utc_offset).date()
    }

    /// Run one cycle against today's source directory.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let today = self.today();
        self.run_cycle_for(today).await
    }

    /// Run one cycle against the source directory for `date`.
    ///
    /// When `date` resolves to a different directory than the previous
    /// cycle, the previous directory gets a final pass first, so files
    /// written there just before the switch are still uploaded. That pass
    /// repeats on later cycles until none of its uploads fail.
    ///
    /// Upload failures are logged and reported in the outcome. The only
    /// error returned is a failure to write the ledger.
    pub async fn run_cycle_for(&mut self, date: Date) -> Result<CycleOutcome> {
        let dir = self.source.resolve(date);
        if let Some(previous) = self.current.replace(dir.clone()) {
            if previous != dir {
                self.draining = Some(previous);
            }
        }

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();

        if let Some(previous) = self.draining.take() {
            info!(source = %previous.display(), "final pass over previous source folder");
            if let CycleOutcome::Synced {
                uploaded: done,
                failed: retry,
            } = self.sync_dir(&previous).await?
            {
                if !retry.is_empty() {
                    self.draining = Some(previous);
                }
                uploaded.extend(done);
                failed.extend(retry);
            }
        }

        match self.sync_dir(&dir).await? {
            CycleOutcome::Synced {
                uploaded: done,
                failed: retry,
            } => {
                uploaded.extend(done);
                failed.extend(retry);
            }
            missing if uploaded.is_empty() && failed.is_empty() => return Ok(missing),
            CycleOutcome::SourceMissing(_) => {}
        }

        Ok(CycleOutcome::Synced { uploaded, failed })
    }

    /// Upload everything in `dir` that is not yet in the ledger.
    async fn sync_dir(&mut self, dir: &Path) -> Result<CycleOutcome> {
        if !dir.is_dir() {
            info!(
                source = %dir.display(),
                retry_in_secs = self.interval.as_secs(),
                "source folder does not exist, waiting for next cycle"
            );
            return Ok(CycleOutcome::SourceMissing(dir.to_path_buf()));
        }

        let listing = match list_source_files(dir) {
            Ok(listing) => listing,
            Err(e) => {
                warn!(source = %dir.display(), error = %e, "could not list source folder");
                return Ok(CycleOutcome::SourceMissing(dir.to_path_buf()));
            }
        };

        let delta = compute_delta(&listing, &self.ledger);
        debug!(listed = listing.len(), new = delta.len(), "computed delta");

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();

        for name in delta {
            let path = dir.join(&name);
            match self.store.upload_file(&path, &self.folder_id).await {
                Ok(metadata) => {
                    self.ledger.append(&name)?;
                    info!(
                        file = %name,
                        id = %metadata.id,
                        size = ?metadata.size.map(format_size),
                        "uploaded"
                    );
                    uploaded.push(name);
                }
                Err(e) => {
                    error!(file = %name, error = %e, "failed to upload");
                    failed.push(name);
                }
            }
        }

        Ok(CycleOutcome::Synced { uploaded, failed })
    }

    /// Poll forever, sleeping the configured interval between cycles.
    ///
    /// Returns only if the ledger can no longer be written.
    pub async fn run(mut self) -> Result<Infallible> {
        info!(
            folder_id = %self.folder_id,
            interval_secs = self.interval.as_secs(),
            ledger = %self.ledger.path().display(),
            already_uploaded = self.ledger.len(),
            "starting sync loop"
        );

        loop {
            if let CycleOutcome::Synced { uploaded, failed } = self.run_cycle().await? {
                if !uploaded.is_empty() || !failed.is_empty() {
                    info!(uploaded = uploaded.len(), failed = failed.len(), "cycle finished");
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
