//! pod_drive_sync - Ship generated images to Google Drive from a GPU pod.
//!
//! This library provides functionality to:
//! - Poll an image output folder and upload new files to a Drive folder,
//!   remembering what was sent in a local ledger
//! - Download a model file from a tokenized URL into the web UI's model folder
//! - Authenticate against Google Drive with a service account
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use pod_drive_sync::{Authenticator, DriveClient, DriveScope, SourceDir, SyncLoop, UploadLedger};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("/workspace/credentials.json", DriveScope::Full)?;
//!     let client = DriveClient::new(auth);
//!     let ledger = UploadLedger::load("/workspace/copied_files.txt")?;
//!
//!     let sync = SyncLoop::new(
//!         client,
//!         SourceDir::Flat("/workspace/stable-diffusion-webui/outputs".into()),
//!         "folder-id",
//!         ledger,
//!         Duration::from_secs(120),
//!     );
//!     sync.run().await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod models;
pub mod prompt;
pub mod sync;
pub mod url_parser;

// Re-exports for convenience
pub use auth::{Authenticator, DriveScope};
pub use client::{DriveClient, DriveStore};
pub use config::{ConfigStore, Settings, SourceDir, SourceLayout, StoredConfig};
pub use error::{Result, SyncError};
pub use fetch::ModelFetcher;
pub use ledger::UploadLedger;
pub use models::FileMetadata;
pub use prompt::{Action, Prompter};
pub use sync::{CycleOutcome, SyncLoop};
pub use url_parser::{extract_id, inject_token};
