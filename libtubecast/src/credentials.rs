//! Platform credentials for the upload adapter
//!
//! The uploader never reads tokens itself. It asks a [`CredentialProvider`]
//! for a bearer token before each attempt, which keeps refresh logic and
//! token storage out of the upload protocol.
//!
//! [`TokenFileProvider`] reads the JSON token file written by the OAuth
//! installed-app consent flow:
//!
//! ```json
//! {
//!   "access_token": "ya29...",
//!   "refresh_token": "1//0g...",
//!   "expires_at": "2026-01-01T12:00:00Z",
//!   "client_id": "1234.apps.googleusercontent.com",
//!   "client_secret": "GOCSPX-...",
//!   "token_uri": "https://oauth2.googleapis.com/token"
//! }
//! ```
//!
//! The consent flow itself is out of scope; run it once with Google's
//! tooling and point `youtube.token_file` at the result.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::AuthError;

/// Refresh when the token expires within this window
const REFRESH_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Source of bearer tokens for the platform API
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a token that is valid for at least the next request
    async fn access_token(&self) -> Result<SecretString, AuthError>;
}

/// Fixed token, for tests and for callers that manage refresh elsewhere
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<SecretString, AuthError> {
        Ok(SecretString::from(self.token.clone()))
    }
}

/// On-disk token format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    /// Fields written by other tools are kept on rewrite
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(REFRESH_MARGIN_SECS) < expires_at,
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Whether the token file can authorize uploads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenStatus {
    pub authenticated: bool,
    pub token_file: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token and client credentials are present
    pub refreshable: bool,
    /// Why the file cannot be used, when it cannot
    pub problem: Option<String>,
}

/// OAuth token file with refresh-on-expiry
///
/// The token is cached in memory after the first read. A refreshed token is
/// written back to the file (mode 600 on Unix) so other processes pick it up.
pub struct TokenFileProvider {
    path: PathBuf,
    client: reqwest::Client,
    cached: RwLock<Option<StoredToken>>,
}

impl TokenFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_client(path, reqwest::Client::new())
    }

    pub fn with_client(path: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            client,
            cached: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inspect the token file without contacting the token server
    pub async fn status(&self) -> TokenStatus {
        let mut status = TokenStatus {
            authenticated: false,
            token_file: self.path.display().to_string(),
            expires_at: None,
            refreshable: false,
            problem: None,
        };

        match self.load().await {
            Ok(token) => {
                status.expires_at = token.expires_at;
                status.refreshable = token.refresh_token.is_some()
                    && token.client_id.is_some()
                    && token.client_secret.is_some();
                status.authenticated = status.refreshable || token.is_fresh(Utc::now());
                if !status.authenticated {
                    status.problem =
                        Some("Token expired and cannot be refreshed".to_string());
                }
            }
            Err(e) => status.problem = Some(e.to_string()),
        }

        status
    }

    async fn load(&self) -> Result<StoredToken, AuthError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::MissingToken(self.path.display().to_string()));
            }
            Err(e) => {
                return Err(AuthError::InvalidToken(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let token: StoredToken = serde_json::from_str(&content)
            .map_err(|e| AuthError::InvalidToken(format!("{}: {}", self.path.display(), e)))?;

        if token.access_token.trim().is_empty() {
            return Err(AuthError::InvalidToken(format!(
                "{}: access_token is empty",
                self.path.display()
            )));
        }
        Ok(token)
    }

    async fn refresh(&self, current: &StoredToken) -> Result<StoredToken, AuthError> {
        let (refresh_token, client_id, client_secret) = match (
            &current.refresh_token,
            &current.client_id,
            &current.client_secret,
        ) {
            (Some(r), Some(id), Some(secret)) => (r, id, secret),
            _ => {
                return Err(AuthError::RefreshUnavailable(
                    "token file has no refresh_token/client_id/client_secret".to_string(),
                ))
            }
        };

        tracing::info!("Refreshing expired platform access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ];

        let resp = self
            .client
            .post(&current.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(format!("{} - {}", status.as_u16(), text)));
        }

        let body: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("unexpected token response: {}", e)))?;

        let mut refreshed = current.clone();
        refreshed.access_token = body.access_token;
        refreshed.expires_at = match body.expires_in {
            Some(secs) => Some(
                Duration::try_seconds(secs)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AuthError::RefreshFailed(format!("expires_in out of range: {}", secs))
                    })?,
            ),
            None => None,
        };
        if body.refresh_token.is_some() {
            refreshed.refresh_token = body.refresh_token;
        }

        tracing::debug!(expires_at = ?refreshed.expires_at, "Access token refreshed");
        Ok(refreshed)
    }

    async fn persist(&self, token: &StoredToken) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("could not save token: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, perms)
                .await
                .map_err(|e| AuthError::RefreshFailed(format!("could not save token: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for TokenFileProvider {
    async fn access_token(&self) -> Result<SecretString, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(ref token) = *cached {
                if token.is_fresh(Utc::now()) {
                    return Ok(SecretString::from(token.access_token.clone()));
                }
            }
        }

        let mut cached = self.cached.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(ref token) = *cached {
            if token.is_fresh(Utc::now()) {
                return Ok(SecretString::from(token.access_token.clone()));
            }
        }

        let current = match cached.take() {
            Some(token) => token,
            None => self.load().await?,
        };

        let token = if current.is_fresh(Utc::now()) {
            current
        } else {
            let refreshed = self.refresh(&current).await?;
            self.persist(&refreshed).await?;
            refreshed
        };

        let secret = SecretString::from(token.access_token.clone());
        *cached = Some(token);
        Ok(secret)
    }
}
