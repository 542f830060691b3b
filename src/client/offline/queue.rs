//! # Write Outcomes and Sync Events
//!
//! Types returned by the offline queue and broadcast to observers.

use chrono::{DateTime, Utc};

use crate::client::api::ApiResponse;
use crate::client::local_db::SyncFailure;
use crate::shared::WriteMethod;

/// Status reported for a write accepted into the log
pub const ACCEPTED_PENDING_STATUS: u16 = 202;

/// What happened to a write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Sent and acknowledged by the backend
    Delivered(ApiResponse),
    /// Persisted locally; will be replayed when the backend is reachable
    Queued {
        mutation_id: i64,
        queued_at: DateTime<Utc>,
    },
}

impl WriteOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, WriteOutcome::Queued { .. })
    }

    /// HTTP status, `202` for a queued write
    pub fn status(&self) -> u16 {
        match self {
            WriteOutcome::Delivered(response) => response.status,
            WriteOutcome::Queued { .. } => ACCEPTED_PENDING_STATUS,
        }
    }

    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            WriteOutcome::Delivered(response) => Some(response),
            WriteOutcome::Queued { .. } => None,
        }
    }
}

/// Why a replay did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    /// Another replay in this process is in progress
    AlreadyRunning,
    /// Another process holds the replay lease
    LeaseHeld,
}

/// Result of one pass over the log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    pub skipped: Option<SkipReason>,
    /// Writes the backend acknowledged
    pub replayed: usize,
    /// Writes the backend permanently rejected
    pub failed: Vec<SyncFailure>,
    /// Set when replay stopped on a transient error
    pub deferred: Option<String>,
    /// Entries left in the log afterwards
    pub remaining: u64,
}

impl ReplayReport {
    pub(crate) fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }

    /// The log was emptied
    pub fn is_drained(&self) -> bool {
        self.ran() && self.deferred.is_none() && self.remaining == 0
    }
}

/// Notification about queue activity
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A write was persisted to the log
    Queued {
        mutation_id: i64,
        method: WriteMethod,
        url: String,
    },
    /// A write went straight through
    Delivered {
        method: WriteMethod,
        url: String,
        status: u16,
    },
    /// A queued write was acknowledged on replay
    Replayed { mutation_id: i64, status: u16 },
    /// A queued write was rejected and moved to the failure ledger
    Failed(SyncFailure),
    /// Replay stopped on a transient error; the write stays queued
    Deferred { mutation_id: i64, reason: String },
}
