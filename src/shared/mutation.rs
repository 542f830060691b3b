//! Queued Write Operations
//!
//! A write that could not be delivered when it was made is captured as a
//! [`QueuedMutation`] and kept in the local mutation log until the backend
//! acknowledges it. Entries are immutable: replay only ever reads them and
//! removes them once they are confirmed or permanently rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::shared::SharedError;

/// Header carrying the client-generated idempotency key on replay.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// The write verbs that may be queued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    /// Create a resource
    Post,
    /// Update a resource (partial-field updates in practice)
    Put,
    /// Delete a resource
    Delete,
}

impl WriteMethod {
    /// Wire name of the verb
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMethod::Post => "POST",
            WriteMethod::Put => "PUT",
            WriteMethod::Delete => "DELETE",
        }
    }

    /// The equivalent reqwest method
    pub fn to_http(self) -> reqwest::Method {
        match self {
            WriteMethod::Post => reqwest::Method::POST,
            WriteMethod::Put => reqwest::Method::PUT,
            WriteMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMethod {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(WriteMethod::Post),
            "PUT" => Ok(WriteMethod::Put),
            "DELETE" => Ok(WriteMethod::Delete),
            other => Err(SharedError::UnsupportedMethod(other.to_string())),
        }
    }
}

/// A write that has been captured but not yet persisted.
///
/// The log assigns the monotonic id when the mutation is appended, which is
/// what turns a `NewMutation` into a [`QueuedMutation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMutation {
    pub method: WriteMethod,
    pub url: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub idempotency_key: Uuid,
    pub queued_at: DateTime<Utc>,
}

impl NewMutation {
    /// Capture a write now, with a fresh idempotency key
    pub fn new(
        method: WriteMethod,
        url: impl Into<String>,
        body: Option<Value>,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            method,
            url: url.into(),
            body,
            headers,
            idempotency_key: Uuid::new_v4(),
            queued_at: Utc::now(),
        }
    }
}

/// A durable record of one pending write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    /// Ordering key within the log, strictly increasing
    pub id: i64,
    pub method: WriteMethod,
    /// Target resource path, forwarded verbatim to the dispatcher
    pub url: String,
    /// Opaque payload
    pub body: Option<Value>,
    /// Headers captured at enqueue time
    pub headers: Vec<(String, String)>,
    /// Sent as `Idempotency-Key` so a backend that honours it can drop duplicates
    pub idempotency_key: Uuid,
    pub queued_at: DateTime<Utc>,
}

impl QueuedMutation {
    /// Headers to send on replay, including the idempotency key
    pub fn replay_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(IDEMPOTENCY_HEADER))
        {
            headers.push((
                IDEMPOTENCY_HEADER.to_string(),
                self.idempotency_key.to_string(),
            ));
        }
        headers
    }

    /// How long this entry has been waiting
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.queued_at
    }
}
