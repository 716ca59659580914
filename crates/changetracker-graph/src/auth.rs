//! OAuth 2.0 device authorization grant against Microsoft identity platform.
//!
//! Tokens are cached on disk next to the configuration. A cached access token
//! is reused while it is fresh, a cached refresh token is tried next, and the
//! interactive device code flow runs only when both fail.

use crate::{Error, Result};
use chrono::{DateTime, Duration as TokenLifetime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Delegated Graph permissions plus a refresh token
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default offline_access";

pub const TOKEN_CACHE_FILE: &str = ".token-cache.json";

/// Access tokens closer than this to expiry are not reused
const EXPIRY_MARGIN_SECS: i64 = 300;

const SLOW_DOWN_STEP_SECS: u64 = 5;

/// Code the user enters at the verification page
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeviceCode {
    /// Instructions to show the user
    pub fn instructions(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format!(
                "To sign in, open {} and enter the code {}",
                self.verification_uri, self.user_code
            ),
        }
    }
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Tokens persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCache {
    pub client_id: String,
    pub tenant_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenCache {
    /// Read a cache file; a missing or unreadable cache is no cache
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token cache {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn belongs_to(&self, client_id: &str, tenant_id: &str) -> bool {
        self.client_id == client_id && self.tenant_id == tenant_id
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TokenLifetime::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

/// Device code authentication for one app registration and tenant
pub struct DeviceCodeAuth {
    http: Client,
    authority: String,
    client_id: String,
    tenant_id: String,
    cache_path: PathBuf,
}

impl DeviceCodeAuth {
    pub fn new(client_id: impl Into<String>, tenant_id: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            authority: DEFAULT_AUTHORITY.to_string(),
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            cache_path: PathBuf::from(TOKEN_CACHE_FILE),
        })
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}/oauth2/v2.0/{}", self.authority, self.tenant_id, name)
    }

    /// Get an access token, prompting for device login only when needed
    pub async fn acquire<F>(&self, prompt: F) -> Result<String>
    where
        F: FnOnce(&DeviceCode),
    {
        let cached = TokenCache::load(&self.cache_path)
            .filter(|cache| cache.belongs_to(&self.client_id, &self.tenant_id));

        if let Some(cache) = cached {
            if cache.is_fresh(Utc::now()) {
                tracing::debug!("Using cached access token");
                return Ok(cache.access_token);
            }
            if let Some(refresh_token) = &cache.refresh_token {
                match self.refresh(refresh_token).await {
                    Ok(token) => return Ok(token),
                    Err(e) => tracing::warn!("Token refresh failed, signing in again: {}", e),
                }
            }
        }

        let code = self.request_device_code().await?;
        prompt(&code);
        self.poll_for_token(&code).await
    }

    async fn request_device_code(&self) -> Result<DeviceCode> {
        let response = self
            .http
            .post(self.endpoint("devicecode"))
            .form(&[("client_id", self.client_id.as_str()), ("scope", GRAPH_SCOPE)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Auth(describe_failure(&body)));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn poll_for_token(&self, code: &DeviceCode) -> Result<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(code.expires_in);
        let mut interval = code.interval;

        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;

            let response = self
                .http
                .post(self.endpoint("token"))
                .form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("client_id", self.client_id.as_str()),
                    ("device_code", code.device_code.as_str()),
                ])
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            if status.is_success() {
                return self.store(serde_json::from_str(&body)?);
            }

            match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) if err.error == "authorization_pending" => {}
                Ok(err) if err.error == "slow_down" => interval += SLOW_DOWN_STEP_SECS,
                _ => return Err(Error::Auth(describe_failure(&body))),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Auth("Device code expired before sign-in".to_string()));
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Auth(describe_failure(&body)));
        }

        tracing::debug!("Refreshed access token");
        self.store(serde_json::from_str(&body)?)
    }

    fn store(&self, token: TokenResponse) -> Result<String> {
        let cache = TokenCache {
            client_id: self.client_id.clone(),
            tenant_id: self.tenant_id.clone(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + TokenLifetime::seconds(token.expires_in),
        };

        if let Err(e) = cache.save(&self.cache_path) {
            tracing::warn!("Could not write token cache {}: {}", self.cache_path.display(), e);
        }
        Ok(cache.access_token)
    }
}

fn describe_failure(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(description) => format!("{}: {}", err.error, description),
            None => err.error,
        },
        Err(_) => body.to_string(),
    }
}
