//! Errors for the plain-data types in [`crate::shared`]
//!
//! These come up when a value read back from the mutation log or a draft row
//! does not fit the type it is meant to populate.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Only POST, PUT and DELETE are ever queued.
    #[error("'{0}' is not a queueable write method")]
    UnsupportedMethod(String),

    /// A stored JSON payload could not be decoded.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        SharedError::MalformedPayload(err.to_string())
    }
}
