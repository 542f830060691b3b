//! URL normalization
//!
//! Every request path goes through [`UrlNormalizer::normalize`] before it is
//! sent:
//!
//! - relative paths are joined to the configured backend base;
//! - absolute URLs that point at the frontend origin (a misconfigured caller)
//!   are moved to the backend origin, keeping path, query and fragment;
//! - collection paths get a trailing slash, item paths (numeric last segment)
//!   lose it. The backend does not redirect on slash mismatches.

use reqwest::Url;

use crate::client::api::error::DispatchError;
use crate::client::config::Config;
use crate::shared::ConfigError;

#[derive(Debug, Clone)]
pub struct UrlNormalizer {
    base: Url,
    frontend: Option<Url>,
}

impl UrlNormalizer {
    pub fn new(base: Url, frontend: Option<Url>) -> Self {
        Self { base, frontend }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.server_base()?, config.frontend_origin()))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` to the URL that is actually sent
    pub fn normalize(&self, path: &str) -> Result<Url, DispatchError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(DispatchError::InvalidUrl(path.to_string()));
        }

        let mut url = if has_scheme(path) {
            let absolute =
                Url::parse(path).map_err(|_| DispatchError::InvalidUrl(path.to_string()))?;
            if !matches!(absolute.scheme(), "http" | "https") || !absolute.has_host() {
                return Err(DispatchError::InvalidUrl(path.to_string()));
            }
            self.reroute(absolute)
        } else {
            let joined = format!(
                "{}/{}",
                self.base.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            );
            Url::parse(&joined).map_err(|_| DispatchError::InvalidUrl(path.to_string()))?
        };

        let fixed = Self::slash_policy(url.path());
        if fixed != url.path() {
            url.set_path(&fixed);
        }
        Ok(url)
    }

    fn reroute(&self, url: Url) -> Url {
        let Some(frontend) = &self.frontend else {
            return url;
        };
        if url.origin() != frontend.origin() || url.origin() == self.base.origin() {
            return url;
        }
        let mut rerouted = self.base.clone();
        rerouted.set_path(url.path());
        rerouted.set_query(url.query());
        rerouted.set_fragment(url.fragment());
        tracing::debug!(from = %url, to = %rerouted, "rewrote frontend-origin URL to backend");
        rerouted
    }

    fn slash_policy(path: &str) -> String {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return "/".to_string();
        }
        let last = trimmed.rsplit('/').next().unwrap_or_default();
        if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        }
    }
}

/// True when `path` starts with a URL scheme such as `https:`
fn has_scheme(path: &str) -> bool {
    match path.split_once("://") {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
