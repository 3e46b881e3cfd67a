//! One-shot model download into the web UI's model folder.

use std::io;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::{Client, Url};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{SyncError, Result};
use crate::models::format_size;
use crate::url_parser::inject_token;

/// Downloads a model to a temp file, then moves it into place.
pub struct ModelFetcher {
    http: Client,
    temp_path: PathBuf,
    destination_dir: PathBuf,
    file_name: String,
}

impl ModelFetcher {
    pub fn new(
        temp_path: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            temp_path: temp_path.into(),
            destination_dir: destination_dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.temp_model_path(),
            &settings.model_dir,
            &settings.model_file_name,
        )
    }

    pub fn destination(&self) -> PathBuf {
        self.destination_dir.join(&self.file_name)
    }

    /// Download `url` with `api_key` attached and install it as the model.
    ///
    /// Returns the final path of the model file.
    pub async fn fetch(&self, url: &str, api_key: &str) -> Result<PathBuf> {
        let url = inject_token(url, api_key)?;
        let bytes = self.download(&url).await?;
        info!(size = %format_size(bytes), temp = %self.temp_path.display(), "download complete");

        fs::create_dir_all(&self.destination_dir).await?;
        let destination = self.destination();
        move_file(&self.temp_path, &destination).await?;

        info!(destination = %destination.display(), "model moved into place");
        Ok(destination)
    }

    /// Stream the response body into the temp file, returning its size.
    async fn download(&self, url: &str) -> Result<u64> {
        info!(url = %display_without_query(url), "downloading model");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::DownloadError {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(parent) = self.temp_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = File::create(&self.temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        debug!(bytes = written, "response body written");
        Ok(written)
    }
}

/// Move `from` to `to`, replacing `to`.
///
/// Falls back to copy-and-delete when a rename is not possible, such as
/// across filesystems.
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!(error = %e, "rename failed, copying instead");
            fs::copy(from, to).await?;
            fs::remove_file(from).await
        }
    }
}

/// Scheme, host and path of `url`, so logs never carry the token.
fn display_without_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
