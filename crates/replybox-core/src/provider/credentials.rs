//! Authorized-user credentials and access token cache
//!
//! The credential file is read once at startup. Access tokens are kept for
//! the lifetime of the process and refreshed through the token endpoint when
//! they are missing, about to expire, or rejected by the API.

use chrono::{DateTime, Duration, Utc};
use replybox_common::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Refresh this long before the recorded expiry
const EXPIRY_SKEW_SECS: i64 = 60;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Contents of an authorized-user credential file
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: Option<String>,
    /// Last issued access token, if the file carries one
    pub token: Option<String>,
    /// Expiry of `token`, RFC 3339
    pub expiry: Option<String>,
    pub token_uri: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl AuthorizedUser {
    /// Read and parse a credential file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Auth(format!(
                "Failed to read credential file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Auth(format!("Invalid credential file {}: {}", path.display(), e)))
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    /// `None` means the lifetime is unknown; the token is used until the API
    /// rejects it.
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now + Duration::seconds(EXPIRY_SKEW_SECS),
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Process-wide access token cache
pub struct TokenCache {
    credentials: AuthorizedUser,
    token_url: String,
    client: Client,
    current: RwLock<Option<AccessToken>>,
}

impl TokenCache {
    /// Create a cache seeded with the token stored in the credentials, if any
    pub fn new(credentials: AuthorizedUser, token_url: Option<String>, client: Client) -> Self {
        let token_url = token_url
            .or_else(|| credentials.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());

        let seeded = credentials.token.clone().map(|value| AccessToken {
            value,
            expires_at: credentials.expiry.as_deref().map(parse_expiry),
        });

        Self {
            credentials,
            token_url,
            client,
            current: RwLock::new(seeded),
        }
    }

    /// Load credentials from `path` and build a cache
    pub async fn load(path: &Path, token_url: Option<String>, client: Client) -> Result<Self> {
        let credentials = AuthorizedUser::from_file(path).await?;
        info!(
            path = %path.display(),
            scopes = credentials.scopes.len(),
            "Loaded provider credentials"
        );
        Ok(Self::new(credentials, token_url, client))
    }

    /// Return a usable access token, refreshing it when needed
    pub async fn access_token(&self) -> Result<String> {
        let now = Utc::now();

        {
            let current = self.current.read().await;
            if let Some(token) = current.as_ref().filter(|t| t.is_fresh(now)) {
                return Ok(token.value.clone());
            }
        }

        let mut current = self.current.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = current.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let token = self.refresh().await?;
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    /// Drop the cached token if it is still `rejected`, so the next call
    /// refreshes it. A token another task already replaced is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut current = self.current.write().await;
        if current.as_ref().is_some_and(|t| t.value == rejected) {
            *current = None;
            debug!("Access token invalidated");
        }
    }

    async fn refresh(&self) -> Result<AccessToken> {
        let refresh_token = self.credentials.refresh_token.as_deref().ok_or_else(|| {
            Error::Auth("Access token expired and no refresh token is available".to_string())
        })?;

        debug!(token_url = %self.token_url, "Refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::provider(None, format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token refresh rejected");
            return Err(Error::Auth(format!(
                "Token refresh failed with {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("Invalid token response: {}", e)))?;

        // Out-of-range lifetimes are treated as unknown
        let expires_at = token
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime));

        info!(expires_at = ?expires_at, "Access token refreshed");

        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }
}

/// Unparseable expiry values are treated as already expired
fn parse_expiry(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
