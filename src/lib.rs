//! Complaint Sync - Main Library
//!
//! Offline-resilient write queue and sync protocol for the complaint
//! tracking client. A client keeps creating and editing complaints while the
//! backend is unreachable; writes are stored locally, replayed in order once
//! the backend answers again, and a query-keyed read cache is kept
//! consistent with both local edits and server responses.
//!
//! # Module Structure
//!
//! - **`shared`** - Plain data shared by every layer
//!   - Queued mutations, list queries and cache keys, list pages
//!   - Resource path parsing, configuration, shared errors
//!
//! - **`client`** - The client runtime
//!   - `api`: request dispatcher with URL normalisation, retry and
//!     single-flight credential refresh
//!   - `local_db`: SQLite mutation log, draft slot and sync bookkeeping
//!   - `cache`: read cache for list pages
//!   - `offline`: write queue, optimistic updates and reconciliation
//!   - `sync`: connectivity monitor and the background replay loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use complaint_sync::client::{Config, SyncClient};
//! use complaint_sync::shared::WriteMethod;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SyncClient::open(Config::new()).await?;
//! client.start();
//!
//! let outcome = client
//!     .offline()
//!     .write(WriteMethod::Put, "/complaints/1", Some(json!({"work_order_number": "B"})), vec![])
//!     .await?;
//! println!("status {}, pending: {}", outcome.status(), outcome.is_pending());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Each layer has its own `thiserror` enum: `SharedError`, `ConfigError`,
//! `DispatchError`, `RefreshError`, `LocalDbError` and `OfflineError`.
//! Errors only propagate once local recovery (retry, refresh, queue) is
//! exhausted.

/// Shared types and data structures
pub mod shared;

/// Client runtime
pub mod client;
