//! URL helpers: Google Drive ID extraction and download token injection.

use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

use crate::error::{SyncError, Result};

/// Query parameter carrying the API token on model download URLs.
pub const TOKEN_PARAM: &str = "token";

/// Regex patterns for Google Drive URLs.
static FOLDER_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/([a-zA-Z0-9_-]+)")
        .expect("Invalid folder URL regex")
});

static OPEN_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://drive\.google\.com/open\?id=([a-zA-Z0-9_-]+)")
        .expect("Invalid open URL regex")
});

/// Valid Google Drive ID pattern (alphanumeric, underscore, hyphen).
static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("Invalid ID regex"));

/// Extract a Google Drive folder ID from a URL or validate a raw ID.
///
/// Supports the following formats:
/// - `https://drive.google.com/drive/folders/<ID>`
/// - `https://drive.google.com/drive/u/0/folders/<ID>`
/// - `https://drive.google.com/open?id=<ID>`
/// - Raw ID string
///
/// # Examples
///
/// ```
/// use pod_drive_sync::url_parser::extract_id;
///
/// let id = extract_id("https://drive.google.com/drive/folders/1abc123").unwrap();
/// assert_eq!(id, "1abc123");
///
/// let id = extract_id("1abc123").unwrap();
/// assert_eq!(id, "1abc123");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    let trimmed = url_or_id.trim();

    for regex in [&*FOLDER_URL_REGEX, &*OPEN_URL_REGEX] {
        if let Some(id) = regex.captures(trimmed).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if ID_REGEX.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(SyncError::InvalidUrlOrId(url_or_id.to_string()))
}

/// Set the `token` query parameter of `url` to `token`.
///
/// Any existing `token` parameters are removed first, so the result always
/// carries exactly one. Other parameters keep their relative order.
///
/// ```
/// use pod_drive_sync::url_parser::inject_token;
///
/// let url = inject_token("https://host/file?version=2&token=old", "abc123").unwrap();
/// assert_eq!(url, "https://host/file?version=2&token=abc123");
/// ```
pub fn inject_token(url: &str, token: &str) -> Result<String> {
    let mut parsed = Url::parse(url.trim()).map_err(|e| SyncError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(TOKEN_PARAM, token);

    Ok(parsed.into())
}
