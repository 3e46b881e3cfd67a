//! Error types for the pod_drive_sync crate.

use thiserror::Error;

/// Errors raised while syncing outputs to Google Drive or fetching models.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Download failed ({status}): {message}")]
    DownloadError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Filename cannot be recorded in the ledger: {0:?}")]
    UnrecordableName(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Invalid choice {0:?}, expected 1 or 2")]
    InvalidChoice(String),

    #[error("{0} is required")]
    MissingValue(&'static str),

    #[error(
        "Cannot access Drive folder {folder_id}: {source}. \
         Ensure that the service account has been granted access to this folder."
    )]
    FolderAccessDenied {
        folder_id: String,
        source: Box<SyncError>,
    },

    #[error("Invalid Google Drive folder ID or access issue ({folder_id}): {source}")]
    FolderUnavailable {
        folder_id: String,
        source: Box<SyncError>,
    },
}

impl SyncError {
    /// Wrap a failed folder lookup, adding the permission hint on 403.
    pub fn folder_check(folder_id: impl Into<String>, err: SyncError) -> Self {
        let folder_id = folder_id.into();
        if err.is_forbidden() {
            SyncError::FolderAccessDenied {
                folder_id,
                source: Box::new(err),
            }
        } else {
            SyncError::FolderUnavailable {
                folder_id,
                source: Box::new(err),
            }
        }
    }

    /// True when the Drive API refused access to the resource.
    pub fn is_forbidden(&self) -> bool {
        match self {
            SyncError::ApiError { status, message } => {
                *status == 403 || message.to_lowercase().contains("forbidden")
            }
            _ => false,
        }
    }
}

/// Result type alias for SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;
