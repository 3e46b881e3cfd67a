//! pod_drive_sync CLI - Sync generated images to Google Drive or fetch a model.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use time::UtcOffset;
use tracing_subscriber::EnvFilter;

use pod_drive_sync::config::{
    DEFAULT_CREDENTIALS_PATH, DEFAULT_MODEL_DIR, DEFAULT_MODEL_FILE_NAME, DEFAULT_OUTPUTS_DIR,
    DEFAULT_POLL_INTERVAL, DEFAULT_STATE_DIR,
};
use pod_drive_sync::{app, DriveScope, Prompter, Settings, SourceDir, SourceLayout};

/// Upload new Stable Diffusion outputs to Google Drive, or download a model.
#[derive(Parser)]
#[command(name = "pod_drive_sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to service account JSON credentials file.
    #[arg(long, env = "POD_SYNC_CREDENTIALS", default_value = DEFAULT_CREDENTIALS_PATH)]
    credentials: PathBuf,

    /// Directory holding config.json, the upload ledger and download temp files.
    #[arg(long, env = "POD_SYNC_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,

    /// Root of the web UI output folder.
    #[arg(long, env = "POD_SYNC_OUTPUTS_DIR", default_value = DEFAULT_OUTPUTS_DIR)]
    outputs_dir: PathBuf,

    /// Watch today's txt2img-images/<date> folder ("dated") or the root itself ("flat").
    #[arg(long, env = "POD_SYNC_LAYOUT", default_value = "dated")]
    layout: SourceLayout,

    /// Folder the downloaded model is moved into.
    #[arg(long, env = "POD_SYNC_MODEL_DIR", default_value = DEFAULT_MODEL_DIR)]
    model_dir: PathBuf,

    /// File name given to the downloaded model.
    #[arg(long, env = "POD_SYNC_MODEL_NAME", default_value = DEFAULT_MODEL_FILE_NAME)]
    model_name: String,

    /// Seconds between sync cycles.
    #[arg(long, env = "POD_SYNC_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    interval_secs: u64,

    /// OAuth scope to request: "drive" or "drive.file".
    #[arg(long, env = "POD_SYNC_SCOPE", default_value = "drive")]
    scope: DriveScope,
}

impl Cli {
    fn into_settings(self) -> Settings {
        Settings {
            credentials_path: self.credentials,
            state_dir: self.state_dir,
            source: SourceDir::new(self.layout, self.outputs_dir),
            model_dir: self.model_dir,
            model_file_name: self.model_name,
            poll_interval: Duration::from_secs(self.interval_secs),
            scope: self.scope,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Must be read while the process is still single threaded.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Cli::parse().into_settings();

    let Some(client) = app::connect(&settings)
        .await
        .context("Google Drive authentication failed")?
    else {
        return Ok(());
    };

    app::run(&settings, client, &mut Prompter::stdio(), utc_offset).await?;
    Ok(())
}
