//! # Sync Status
//!
//! Snapshot of the queue for status bars and diagnostics.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::client::sync::network_monitor::ConnectivityState;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    /// Writes waiting in the log
    pub pending: u64,
    pub oldest_queued_at: Option<DateTime<Utc>>,
    /// Last replay that drained the log
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Rejected writes not yet dismissed
    pub failures: usize,
    pub connectivity: ConnectivityState,
}

impl SyncStatus {
    pub fn has_pending(&self) -> bool {
        self.pending > 0
    }

    /// Whether the oldest pending write has waited longer than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.oldest_queued_at {
            Some(oldest) => (now - oldest)
                .to_std()
                .map(|age| age > max_age)
                .unwrap_or(false),
            None => false,
        }
    }
}
