//! Client configuration: code, environment, or YAML file.
//!
//! Environment variables (all optional):
//! - `INTURA_API_KEY`: API key used when none is passed explicitly
//! - `INTURA_API_BASE_URL`: experimentation service host
//! - `INTURA_API_VERSION`: path version prefix (default `v1`)
//! - `INTURA_HTTP_TIMEOUT_SECS`: transport timeout (default 30)

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str =
    "https://intura-be-external-server-566556985624.asia-southeast2.run.app";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const API_KEY_ENV: &str = "INTURA_API_KEY";
pub const BASE_URL_ENV: &str = "INTURA_API_BASE_URL";
pub const API_VERSION_ENV: &str = "INTURA_API_VERSION";
pub const TIMEOUT_ENV: &str = "INTURA_HTTP_TIMEOUT_SECS";

/// Settings for [`crate::InturaFetch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Explicit API key. When `None` the key is looked up in the environment,
    /// then in the OS keyring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by whatever `INTURA_*` variables are set.
    ///
    /// The API key variable is not read here; it is a fallback consulted at
    /// client construction so an explicit key always wins.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                cfg.base_url = url;
            }
        }
        if let Ok(version) = env::var(API_VERSION_ENV) {
            if !version.trim().is_empty() {
                cfg.api_version = version;
            }
        }
        if let Some(secs) = env::var(TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            cfg.timeout_secs = secs;
        }
        cfg
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid client configuration: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read client configuration: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the service host (primarily for testing with mock servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
