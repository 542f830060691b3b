//! Dispatch errors
//!
//! Classifies every way a request can fail into transient (worth another
//! attempt later) or permanent (the request itself is wrong and will never
//! succeed as sent).

use std::fmt;
use thiserror::Error;

/// Connection-level failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Connection refused or unreachable
    Connect,
    /// Timed out
    Timeout,
    /// Connection dropped mid-request
    Aborted,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Connect => "connect",
            TransportKind::Timeout => "timeout",
            TransportKind::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Errors returned by the dispatcher once it has run out of local recovery
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("{kind} error after {attempts} attempt(s): {message}")]
    Transport {
        kind: TransportKind,
        message: String,
        attempts: u32,
    },

    #[error("server returned {status} after {attempts} attempt(s)")]
    Server {
        status: u16,
        body: String,
        attempts: u32,
    },

    #[error("request rejected with {status}: {body}")]
    Client { status: u16, body: String },

    /// 401 that survived a credential refresh, or whose refresh failed
    #[error("not authorized; session cleared")]
    Unauthorized { body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("could not build request: {0}")]
    Request(String),
}

impl DispatchError {
    /// Connection-level errors and 5xx: worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DispatchError::Transport { .. } | DispatchError::Server { .. }
        )
    }

    /// Errors that will not go away by resending the same request
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DispatchError::Client { .. }
                | DispatchError::InvalidUrl(_)
                | DispatchError::Decode(_)
                | DispatchError::Request(_)
        )
    }

    /// HTTP status, when the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Server { status, .. } | DispatchError::Client { status, .. } => {
                Some(*status)
            }
            DispatchError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    pub(crate) fn with_attempts(self, n: u32) -> Self {
        match self {
            DispatchError::Transport { kind, message, .. } => DispatchError::Transport {
                kind,
                message,
                attempts: n,
            },
            DispatchError::Server { status, body, .. } => DispatchError::Server {
                status,
                body,
                attempts: n,
            },
            other => other,
        }
    }

    /// Map a status code that is not 2xx
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => DispatchError::Unauthorized { body },
            500..=599 => DispatchError::Server {
                status,
                body,
                attempts: 1,
            },
            _ => DispatchError::Client { status, body },
        }
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else if err.is_builder() {
            return DispatchError::Request(message);
        } else if err.is_decode() {
            return DispatchError::Decode(message);
        } else {
            TransportKind::Aborted
        };
        DispatchError::Transport {
            kind,
            message,
            attempts: 1,
        }
    }
}
