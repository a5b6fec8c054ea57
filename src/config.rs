//! Service connection settings.
//!
//! Settings come from the environment (`RNR_*` variables) or from a TOML
//! file with the same keys in lower case:
//!
//! ```toml
//! url = "https://gateway.example.com/retrieve-and-rank/api"
//! version = "v1"
//! username = "service-user"
//! password = "service-password"
//! timeout_ms = 120000
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::ClientError;

const DEFAULT_VERSION: &str = "v1";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Base url, API version and credentials of one service instance.
#[derive(Clone, Deserialize)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in milliseconds. Must be non-zero.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("url", &self.url)
            .field("version", &self.version)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            version: default_version(),
            username: username.into(),
            password: password.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        let url = std::env::var("RNR_URL").map_err(|_| ClientError::config("RNR_URL not set"))?;
        let username = std::env::var("RNR_USERNAME")
            .map_err(|_| ClientError::config("RNR_USERNAME not set"))?;
        let password = std::env::var("RNR_PASSWORD")
            .map_err(|_| ClientError::config("RNR_PASSWORD not set"))?;

        let version = std::env::var("RNR_VERSION").unwrap_or_else(|_| default_version());

        let timeout_ms = match std::env::var("RNR_TIMEOUT_MS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ClientError::config(format!("RNR_TIMEOUT_MS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_MS,
        };

        let config = Self {
            url,
            version,
            username,
            password,
            timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ClientError> {
        let config: Self = toml::from_str(content)
            .map_err(|e: toml::de::Error| ClientError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let base = self.base_url()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::config(format!(
                "service url must be http(s): {}",
                self.url
            )));
        }
        if self.version.trim_matches('/').trim().is_empty() {
            return Err(ClientError::config("service version is empty"));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::config("request timeout must be non-zero"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `{url}/{version}/{segment}/...`, each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<String, ClientError> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::config(format!("service url cannot be a base: {}", self.url))
            })?
            .pop_if_empty()
            .push(self.version.trim_matches('/'))
            .extend(segments);
        Ok(url.into())
    }

    fn base_url(&self) -> Result<Url, ClientError> {
        Url::parse(&self.url)
            .map_err(|e| ClientError::config(format!("invalid service url {}: {e}", self.url)))
    }
}
