use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError, DEFAULT_SERVER_URL};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration wrapper.
///
/// Wraps a validated [`AppConfig`] and derives the URLs and durations the
/// runtime pieces need.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut app = AppConfig::default();
        if let Ok(url) = std::env::var("CLIENT_API_URL") {
            app.server_url = url;
        }
        if let Ok(origin) = std::env::var("CLIENT_FRONTEND_ORIGIN") {
            app.frontend_origin = Some(origin);
        }
        if let Ok(path) = std::env::var("COMPLAINT_SYNC_DB") {
            app.database_path = Some(PathBuf::from(path));
        }
        if app.validate().is_err() {
            tracing::warn!(
                server_url = %app.server_url,
                "invalid configuration from environment, falling back to defaults"
            );
            app = AppConfig::default();
        }
        Self { app }
    }
}

impl Config {
    /// Create a new configuration from the environment
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self {
            app: builder.build()?,
        })
    }

    pub fn from_app(app: AppConfig) -> Result<Self, ConfigError> {
        app.validate()?;
        Ok(Self { app })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            app: AppConfig::from_toml_str(text)?,
        })
    }

    /// Load a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn server_url(&self) -> &str {
        &self.app.server_url
    }

    /// Backend base as a parsed URL
    pub fn server_base(&self) -> Result<Url, ConfigError> {
        Url::parse(self.server_url()).map_err(|e| ConfigError::InvalidUrl(e.to_string()))
    }

    /// Parsed frontend origin, if one is configured
    pub fn frontend_origin(&self) -> Option<Url> {
        self.app
            .frontend_origin
            .as_deref()
            .and_then(|origin| Url::parse(origin).ok())
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn health_url(&self) -> String {
        self.api_url(&self.app.health_path)
    }

    pub fn refresh_url(&self) -> String {
        self.api_url(&self.app.refresh_path)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.app.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.app.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.app.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.app.cache_ttl_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.app.sync_interval_secs)
    }

    pub fn sync_lease(&self) -> Duration {
        Duration::from_secs(self.app.sync_lease_secs)
    }

    /// Local database file, defaulting to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.app.database_path {
            return path.clone();
        }
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("complaint-sync");
        path.push("local.db");
        path
    }
}
