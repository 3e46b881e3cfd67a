//! Service account authentication for Google APIs.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{SyncError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint, used when the credentials file names none.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// OAuth scope requested for the Drive API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveScope {
    /// Full access to every file the service account can see.
    Full,
    /// Access limited to files created by this application.
    FileOnly,
}

impl DriveScope {
    pub fn url(&self) -> &'static str {
        match self {
            DriveScope::Full => "https://www.googleapis.com/auth/drive",
            DriveScope::FileOnly => "https://www.googleapis.com/auth/drive.file",
        }
    }
}

impl FromStr for DriveScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "drive" => Ok(DriveScope::Full),
            "drive.file" => Ok(DriveScope::FileOnly),
            other => Err(format!("unknown scope '{other}', expected 'drive' or 'drive.file'")),
        }
    }
}

impl fmt::Display for DriveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveScope::Full => f.write_str("drive"),
            DriveScope::FileOnly => f.write_str("drive.file"),
        }
    }
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

/// Authenticator for Google APIs using service account credentials.
#[derive(Clone)]
pub struct Authenticator {
    credentials: Arc<ServiceAccountCredentials>,
    scope: DriveScope,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create a new authenticator from a service account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P, scope: DriveScope) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials, scope))
    }

    /// Create a new authenticator from credentials.
    pub fn new(credentials: ServiceAccountCredentials, scope: DriveScope) -> Self {
        Self {
            credentials: Arc::new(credentials),
            scope,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    fn token_uri(&self) -> &str {
        self.credentials
            .token_uri
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_URI)
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_BUFFER {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.refresh_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Refresh the access token using JWT assertion.
    async fn refresh_token(&self) -> Result<CachedToken> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SyncError::TokenRefreshError(format!("system clock error: {e}")))?
            .as_secs();

        let claims = Claims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.url().to_string(),
            aud: self.token_uri().to_string(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        let jwt = encode(&header, &claims, &key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &jwt),
        ];

        debug!(token_uri = self.token_uri(), scope = %self.scope, "requesting access token");
        let response = self
            .client
            .post(self.token_uri())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;

        let expires_at =
            SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}
