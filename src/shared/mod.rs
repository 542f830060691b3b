//! Runtime-free data types
//!
//! Types and data structures that do not depend on the client runtime. They
//! describe what travels over the wire and what is written to local storage:
//! queued write operations, list queries, list pages and resource paths.
//!
//! Everything in here is plain data plus pure functions, so it can be used by
//! the sync agent, by tests and by any future host without pulling in tokio
//! or sqlx.

/// Queued write operations
pub mod mutation;

/// List queries and their canonical cache keys
pub mod query;

/// List pages and pagination envelopes
pub mod page;

/// Resource path parsing
pub mod resource;

/// Errors raised while decoding stored values
pub mod error;

/// Application configuration
pub mod config;

pub use mutation::{NewMutation, QueuedMutation, WriteMethod};
pub use query::{CacheKey, ListQuery};
pub use page::{ListEnvelope, ListPage, Pagination};
pub use resource::{merge_fields, record_id, ResourceRef};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
