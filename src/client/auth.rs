//! # Session credentials and credential refresh
//!
//! The dispatcher attaches the current access token to every request. When a
//! request comes back 401 it asks [`AuthSession::refresh_after_unauthorized`]
//! for a new one. Refresh is single-flight:
//!
//! - only one refresh call is in flight at a time;
//! - requests that hit 401 while it runs wait behind it and are woken in
//!   arrival order with the new token;
//! - if it fails, the session is cleared and every waiter gets the failure.
//!
//! A request whose token was already rotated by someone else skips the
//! refresh and retries with the current token.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::client::config::Config;
use crate::shared::ConfigError;

/// Access and refresh credentials for the current session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Where session credentials live. The core only gets, sets and clears them.
pub trait CredentialStore: Send + Sync + fmt::Debug {
    fn load(&self) -> Option<Credentials>;
    fn save(&self, credentials: Credentials);
    fn clear(&self);
}

/// Process-local credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(Some(credentials)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credentials> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn save(&self, credentials: Credentials) {
        *self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(credentials);
    }

    fn clear(&self) {
        *self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Token pair returned by the refresh endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Credential refresh failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh credential stored")]
    MissingRefreshToken,
    #[error("refresh rejected with {status}")]
    Rejected { status: u16 },
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("could not decode refresh response: {0}")]
    Decode(String),
    #[error("refresh was abandoned before completing")]
    Abandoned,
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

/// Current session plus the single-flight refresh coordinator
#[derive(Debug)]
pub struct AuthSession {
    store: Arc<dyn CredentialStore>,
    client: Client,
    refresh_url: String,
    state: Mutex<RefreshState>,
    refresh_calls: AtomicU64,
}

impl AuthSession {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresh_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "request_timeout_secs",
                reason: format!("refresh client: {}", e),
            })?;
        Ok(Self {
            store,
            client,
            refresh_url: refresh_url.into(),
            state: Mutex::new(RefreshState::default()),
            refresh_calls: AtomicU64::new(0),
        })
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ConfigError> {
        Self::new(store, config.refresh_url(), config.request_timeout())
    }

    /// Session with no credentials at all
    pub fn anonymous(config: &Config) -> Result<Self, ConfigError> {
        Self::from_config(config, Arc::new(MemoryCredentialStore::new()))
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.load().map(|c| c.access_token)
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.load().is_some()
    }

    pub fn sign_in(&self, credentials: Credentials) {
        self.store.save(credentials);
    }

    pub fn sign_out(&self) {
        self.store.clear();
    }

    /// Number of refresh calls actually sent to the backend
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Obtain a fresh access token after `stale` was rejected with 401.
    pub async fn refresh_after_unauthorized(
        &self,
        stale: Option<&str>,
    ) -> Result<String, RefreshError> {
        let waiter = {
            let mut state = self.lock_state();
            if let Some(current) = self.store.load() {
                if stale != Some(current.access_token.as_str()) {
                    return Ok(current.access_token);
                }
            }
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            tracing::debug!("waiting on in-flight credential refresh");
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let guard = RefreshGuard {
            session: self,
            finished: false,
        };
        let outcome = match self.request_new_tokens().await {
            Ok(pair) => {
                self.store.save(Credentials::new(
                    pair.access_token.clone(),
                    Some(pair.refresh_token),
                ));
                tracing::info!("credentials refreshed");
                Ok(pair.access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "credential refresh failed, clearing session");
                self.store.clear();
                Err(e)
            }
        };
        guard.finish(&outcome);
        outcome
    }

    async fn request_new_tokens(&self) -> Result<TokenPair, RefreshError> {
        let refresh_token = self
            .store
            .load()
            .and_then(|c| c.refresh_token)
            .ok_or(RefreshError::MissingRefreshToken)?;

        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
            });
        }
        response
            .json::<TokenPair>()
            .await
            .map_err(|e| RefreshError::Decode(e.to_string()))
    }
}

/// Clears the in-flight flag however the refreshing task ends.
struct RefreshGuard<'a> {
    session: &'a AuthSession,
    finished: bool,
}

impl RefreshGuard<'_> {
    fn finish(mut self, outcome: &Result<String, RefreshError>) {
        self.finished = true;
        let waiters = {
            let mut state = self.session.lock_state();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.session.lock_state();
            state.refreshing = false;
            // dropping the senders wakes waiters with Abandoned
            state.waiters.clear();
        }
    }
}
