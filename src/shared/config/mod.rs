//! Application configuration module
//!
//! [`AppConfig`] carries every tunable of the sync core. It can be built in
//! code through [`AppConfigBuilder`] or read from TOML; either way it is
//! validated before use.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default backend URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend base URL that relative paths are joined to
    pub server_url: String,
    /// Origin the UI is served from; absolute URLs pointing here are rewritten
    /// to the backend
    pub frontend_origin: Option<String>,
    /// Liveness endpoint polled by the connectivity monitor
    pub health_path: String,
    /// Credential refresh endpoint
    pub refresh_path: String,
    pub probe_interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fallback replay interval while online
    pub sync_interval_secs: u64,
    /// How long a replay lease is held before another process may take it
    pub sync_lease_secs: u64,
    /// Local database file; the platform data directory when unset
    pub database_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            frontend_origin: None,
            health_path: "/health".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            probe_interval_secs: 15,
            probe_timeout_secs: 3,
            request_timeout_secs: 30,
            cache_ttl_secs: 300,
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
            sync_interval_secs: 60,
            sync_lease_secs: 30,
            database_path: None,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = Url::parse(&self.server_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.server_url, e)))?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(self.server_url.clone()));
        }
        if let Some(origin) = &self.frontend_origin {
            Url::parse(origin)
                .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", origin, e)))?;
        }
        if !self.health_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "health_path",
                reason: "must start with '/'".to_string(),
            });
        }
        if !self.refresh_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "refresh_path",
                reason: "must start with '/'".to_string(),
            });
        }
        for (field, value) in [
            ("probe_interval_secs", self.probe_interval_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("base_delay_ms", self.base_delay_ms),
            ("sync_interval_secs", self.sync_interval_secs),
            ("sync_lease_secs", self.sync_lease_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "max_delay_ms",
                reason: "must not be below base_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    /// Set the origin whose absolute URLs are rewritten to the backend
    pub fn frontend_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.frontend_origin = Some(origin.into());
        self
    }

    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_path = path.into();
        self
    }

    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.config.probe_interval_secs = secs;
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn retry(mut self, max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.config.max_retries = max_retries;
        self.config.base_delay_ms = base_delay_ms;
        self.config.max_delay_ms = max_delay_ms;
        self
    }

    pub fn sync_interval_secs(mut self, secs: u64) -> Self {
        self.config.sync_interval_secs = secs;
        self
    }

    pub fn sync_lease_secs(mut self, secs: u64) -> Self {
        self.config.sync_lease_secs = secs;
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("could not parse configuration: {0}")]
    Parse(String),
    #[error("could not read configuration: {0}")]
    Io(String),
}
