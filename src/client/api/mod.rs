//! # Request Dispatcher
//!
//! HTTP client wrapper used for every call to the backend. One call to
//! [`Dispatcher::send`]:
//!
//! 1. normalizes the target URL (see [`url`]);
//! 2. attaches the session's bearer token;
//! 3. retries connection errors and 5xx responses with exponential backoff
//!    (see [`retry`]), never 4xx;
//! 4. on 401, refreshes credentials once through the session's single-flight
//!    coordinator and resends with the new token.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use complaint_sync::client::api::{ApiRequest, Dispatcher};
//! use complaint_sync::client::auth::AuthSession;
//! use complaint_sync::client::Config;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new();
//! let session = Arc::new(AuthSession::anonymous(&config)?);
//! let dispatcher = Dispatcher::new(&config, session)?;
//!
//! let response = dispatcher
//!     .send(ApiRequest::put("/complaints/1").json(serde_json::json!({"status": "closed"})))
//!     .await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod retry;
pub mod url;

pub use error::{DispatchError, TransportKind};
pub use retry::{BackoffStrategy, RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use url::UrlNormalizer;

use chrono::Utc;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::sync::Arc;

use crate::client::auth::AuthSession;
use crate::client::config::Config;
use crate::shared::{ConfigError, ListEnvelope, ListPage, ListQuery};

/// One request, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }
}

/// A successful response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Decoded JSON body; `None` when the body was empty. Non-JSON bodies are
    /// kept as a JSON string.
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client wrapper with retry and credential refresh
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    urls: UrlNormalizer,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    session: Arc<AuthSession>,
}

impl Dispatcher {
    pub fn new(config: &Config, session: Arc<AuthSession>) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "request_timeout_secs",
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            urls: UrlNormalizer::from_config(config)?,
            retry: RetryPolicy::from_config(config.app()),
            sleeper: Arc::new(TokioSleeper),
            session,
        })
    }

    /// Replace the wait between attempts (tests use [`RecordingSleeper`])
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn urls(&self) -> &UrlNormalizer {
        &self.urls
    }

    /// Execute a request with retry and credential refresh
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, DispatchError> {
        let url = self.urls.normalize(&request.path)?;
        let mut refreshed = false;

        loop {
            let token = self.session.access_token();
            match self.send_with_retry(&request, &url, token.as_deref()).await {
                Err(DispatchError::Unauthorized { body }) if !refreshed => {
                    refreshed = true;
                    tracing::info!(url = %url, "request unauthorized, refreshing credentials");
                    if let Err(e) = self
                        .session
                        .refresh_after_unauthorized(token.as_deref())
                        .await
                    {
                        tracing::warn!(url = %url, error = %e, "giving up on unauthorized request");
                        return Err(DispatchError::Unauthorized { body });
                    }
                }
                other => return other,
            }
        }
    }

    /// GET a list endpoint and normalize either response shape into a page
    pub async fn get_list(&self, path: &str, query: &ListQuery) -> Result<ListPage, DispatchError> {
        let response = self
            .send(ApiRequest::get(path).query(query.to_query_pairs()))
            .await?;
        let body = response.body.unwrap_or(Value::Array(Vec::new()));
        let envelope: ListEnvelope =
            serde_json::from_value(body).map_err(|e| DispatchError::Decode(e.to_string()))?;
        Ok(envelope.into_page(query))
    }

    async fn send_with_retry(
        &self,
        request: &ApiRequest,
        url: &Url,
        token: Option<&str>,
    ) -> Result<ApiResponse, DispatchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.execute_once(request, url, token).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        at = %Utc::now().to_rfc3339(),
                        method = %request.method,
                        url = %url,
                        error = %err,
                        "transient failure, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(err) => return Err(err.with_attempts(attempt)),
            }
        }
    }

    async fn execute_once(
        &self,
        request: &ApiRequest,
        url: &Url,
        token: Option<&str>,
    ) -> Result<ApiResponse, DispatchError> {
        let mut builder = self.client.request(request.method.clone(), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        if !(200..300).contains(&status) {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            return Err(DispatchError::from_status(status, body));
        }

        let body = if bytes.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
            )
        };
        Ok(ApiResponse { status, body })
    }
}
