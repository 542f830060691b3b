//! # Optimistic Update Tracking
//!
//! Remembers which records carry local edits the backend has not confirmed
//! yet. A record stays unreconciled until every queued mutation that touched
//! it has been confirmed or rejected.

use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Pending mutation ids per record id
#[derive(Debug, Default)]
pub struct OptimisticTracker {
    pending: RwLock<HashMap<i64, BTreeSet<i64>>>,
}

impl OptimisticTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `mutation_id` optimistically changed `record_id`
    pub async fn mark(&self, record_id: i64, mutation_id: i64) {
        self.pending
            .write()
            .await
            .entry(record_id)
            .or_default()
            .insert(mutation_id);
    }

    /// Settle one mutation; returns true when the record has no pending edits left
    pub async fn settle(&self, record_id: i64, mutation_id: i64) -> bool {
        let mut pending = self.pending.write().await;
        match pending.get_mut(&record_id) {
            Some(ids) => {
                ids.remove(&mutation_id);
                if ids.is_empty() {
                    pending.remove(&record_id);
                    true
                } else {
                    false
                }
            }
            None => true,
        }
    }

    pub async fn is_unreconciled(&self, record_id: i64) -> bool {
        self.pending.read().await.contains_key(&record_id)
    }

    /// Mutation ids still outstanding for a record, oldest first
    pub async fn pending_for(&self, record_id: i64) -> Vec<i64> {
        self.pending
            .read()
            .await
            .get(&record_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Records with outstanding edits
    pub async fn unreconciled_records(&self) -> Vec<i64> {
        let mut records: Vec<i64> = self.pending.read().await.keys().copied().collect();
        records.sort_unstable();
        records
    }

    pub async fn clear(&self) {
        self.pending.write().await.clear();
    }
}
