//! Google Drive API client for folder checks and uploads.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Body, Client, Response};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::auth::Authenticator;
use crate::error::{SyncError, Result};
use crate::models::{ApiErrorResponse, FileMetadata};

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const FILE_FIELDS: &str = "id, name, size, mimeType";

/// The remote side of a sync: something files can be uploaded into.
#[async_trait]
pub trait DriveStore: Send + Sync {
    /// Fetch metadata for a folder, failing if it is missing or inaccessible.
    async fn get_folder(&self, folder_id: &str) -> Result<FileMetadata>;

    /// Create a new file named after `local_path` inside `parent_id`.
    async fn upload_file(&self, local_path: &Path, parent_id: &str) -> Result<FileMetadata>;
}

/// Client for interacting with Google Drive.
pub struct DriveClient {
    auth: Authenticator,
    http: Client,
    api_base: String,
    upload_base: String,
}

impl std::fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClient")
            .field("api_base", &self.api_base)
            .field("upload_base", &self.upload_base)
            .finish_non_exhaustive()
    }
}

impl DriveClient {
    /// Create a new DriveClient against the public Google endpoints.
    pub fn new(auth: Authenticator) -> Self {
        Self::with_base_urls(auth, DRIVE_API_BASE, UPLOAD_API_BASE)
    }

    /// Create a DriveClient that talks to alternative API endpoints.
    pub fn with_base_urls(
        auth: Authenticator,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            http: Client::new(),
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    /// Get file or folder metadata by ID.
    pub async fn get_file(&self, file_id: &str) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;

        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .send()
            .await?;

        let response = check_status(response).await?;
        let metadata: FileMetadata = response.json().await?;
        Ok(metadata)
    }

    /// Upload a file using a resumable upload session.
    ///
    /// The session is opened with the file metadata, then the file body is
    /// streamed from disk in a single request.
    async fn upload_resumable(
        &self,
        local_path: &Path,
        parent_id: &str,
        filename: &str,
    ) -> Result<FileMetadata> {
        let token = self.auth.get_access_token().await?;
        let file_size = tokio::fs::metadata(local_path).await?.len();
        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();

        let metadata = serde_json::json!({
            "name": filename,
            "parents": [parent_id]
        });

        // Step 1: Initiate resumable upload
        let init_response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&token)
            .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
            .header("X-Upload-Content-Type", &mime_type)
            .header("X-Upload-Content-Length", file_size.to_string())
            .json(&metadata)
            .send()
            .await?;

        let init_response = check_status(init_response).await?;

        let upload_url = init_response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SyncError::ApiError {
                status: 500,
                message: "No upload URL in response".to_string(),
            })?
            .to_string();

        debug!(file = filename, mime_type = %mime_type, size = file_size, "upload session opened");

        // Step 2: Stream the file content
        let file = File::open(local_path).await?;
        let body = Body::wrap_stream(ReaderStream::new(file));

        let upload_response = self
            .http
            .put(&upload_url)
            .bearer_auth(&token)
            .header("Content-Type", &mime_type)
            .header("Content-Length", file_size.to_string())
            .query(&[("fields", FILE_FIELDS)])
            .body(body)
            .send()
            .await?;

        let upload_response = check_status(upload_response).await?;
        let metadata: FileMetadata = upload_response.json().await?;
        Ok(metadata)
    }
}

#[async_trait]
impl DriveStore for DriveClient {
    async fn get_folder(&self, folder_id: &str) -> Result<FileMetadata> {
        self.get_file(folder_id).await
    }

    async fn upload_file(&self, local_path: &Path, parent_id: &str) -> Result<FileMetadata> {
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SyncError::FileNotFound(local_path.display().to_string()))?;

        if !local_path.is_file() {
            return Err(SyncError::FileNotFound(local_path.display().to_string()));
        }

        self.upload_resumable(local_path, parent_id, filename).await
    }
}

/// Turn a non-success response into an `ApiError`, preferring the message
/// from Google's JSON error body when there is one.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(SyncError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(SyncError::ApiError {
        status: status.as_u16(),
        message: error_body,
    })
}
