//! # State Reconciliation
//!
//! Applies the effect of a write to the read cache and to the open detail
//! view, first optimistically when the write is queued and again with the
//! backend's authoritative record once it is confirmed.
//!
//! ## Rules
//!
//! - **Update** (`PUT /complaints/{id}`): fields are merged into every cached
//!   page holding the record and into the detail view if it shows it.
//! - **Delete** (`DELETE /complaints/{id}`): the record is removed from every
//!   cached page and the detail view closes if it shows it.
//! - **Create** and anything outside the tracked collection: list membership
//!   may change in ways the client cannot compute, so the cache is
//!   invalidated once the backend confirms.
//! - **Rejected**: optimistic edits are rolled back and the cache invalidated
//!   so the next read refetches the backend's version.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use complaint_sync::client::cache::ReadCache;
//! use complaint_sync::client::offline::{DetailView, Reconciler};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let reconciler = Reconciler::new(
//!     Arc::new(ReadCache::new(Duration::from_secs(300))),
//!     Arc::new(DetailView::new()),
//! );
//! reconciler.record_deleted_remotely(7).await;
//! # }
//! ```

use serde_json::Value;
use std::sync::Arc;

use crate::client::api::ApiResponse;
use crate::client::cache::ReadCache;
use crate::client::offline::detail::DetailView;
use crate::client::offline::optimistic::OptimisticTracker;
use crate::shared::{merge_fields, QueuedMutation, ResourceRef, WriteMethod};

/// Collection whose list pages the cache holds
pub const DEFAULT_COLLECTION: &str = "complaints";

/// What a reconciliation step changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    /// Cache entries whose pages were edited in place
    pub cache_entries_touched: usize,
    pub cache_invalidated: bool,
    pub detail_updated: bool,
    pub detail_closed: bool,
}

#[derive(Debug)]
pub struct Reconciler {
    cache: Arc<ReadCache>,
    detail: Arc<DetailView>,
    tracker: OptimisticTracker,
    collection: String,
}

impl Reconciler {
    pub fn new(cache: Arc<ReadCache>, detail: Arc<DetailView>) -> Self {
        Self {
            cache,
            detail,
            tracker: OptimisticTracker::new(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    pub fn detail(&self) -> &Arc<DetailView> {
        &self.detail
    }

    pub fn tracker(&self) -> &OptimisticTracker {
        &self.tracker
    }

    /// Record id addressed by `url`, if it is an item of the tracked collection
    fn tracked_item(&self, url: &str) -> Option<i64> {
        ResourceRef::parse(url)
            .filter(|resource| resource.collection == self.collection)
            .and_then(|resource| resource.id)
    }

    /// Show a queued write's intended effect before the backend confirms it
    pub async fn apply_optimistic(&self, mutation: &QueuedMutation) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        let Some(id) = self.tracked_item(&mutation.url) else {
            return result;
        };

        match mutation.method {
            WriteMethod::Put => {
                self.tracker.mark(id, mutation.id).await;
                let changes = mutation.body.clone().unwrap_or(Value::Null);
                if changes.is_object() {
                    result.detail_updated = self.detail.apply_optimistic(id, &changes);
                    result.cache_entries_touched =
                        self.cache.update_entity_in_place(&with_id(changes, id)).await;
                }
            }
            WriteMethod::Delete => {
                self.tracker.mark(id, mutation.id).await;
                result.detail_closed = self.detail.close_if_showing(id);
                result.cache_entries_touched = self.cache.remove_entity_everywhere(id).await;
            }
            WriteMethod::Post => {}
        }

        tracing::debug!(mutation_id = mutation.id, record_id = id, ?result, "applied optimistic write");
        result
    }

    /// Apply the backend's response to a write
    ///
    /// `mutation_id` is set when the write had been queued; it settles the
    /// matching optimistic edit.
    pub async fn apply_confirmed(
        &self,
        method: WriteMethod,
        url: &str,
        request_body: Option<&Value>,
        response: &ApiResponse,
        mutation_id: Option<i64>,
    ) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();

        let Some(id) = self.tracked_item(url) else {
            self.cache.invalidate_all().await;
            result.cache_invalidated = true;
            return result;
        };

        let settled = match mutation_id {
            Some(mutation_id) => self.tracker.settle(id, mutation_id).await,
            None => !self.tracker.is_unreconciled(id).await,
        };

        match method {
            WriteMethod::Put => {
                let authoritative = authoritative_record(id, request_body, response.body.as_ref());
                // Cached pages already carry the later queued edits; leave
                // them until the last one is confirmed.
                if settled {
                    result.cache_entries_touched =
                        self.cache.update_entity_in_place(&authoritative).await;
                }
                result.detail_updated = self.detail.apply_confirmed(id, &authoritative, settled);
            }
            WriteMethod::Delete => {
                result.detail_closed = self.detail.close_if_showing(id);
                result.cache_entries_touched = self.cache.remove_entity_everywhere(id).await;
            }
            WriteMethod::Post => {
                self.cache.invalidate_all().await;
                result.cache_invalidated = true;
            }
        }

        result
    }

    /// Undo a queued write the backend rejected
    pub async fn apply_failed(&self, mutation: &QueuedMutation) -> ReconciliationResult {
        let mut result = ReconciliationResult::default();
        if let Some(id) = self.tracked_item(&mutation.url) {
            let settled = self.tracker.settle(id, mutation.id).await;
            result.detail_updated = self.detail.roll_back(id, settled);
        }
        self.cache.invalidate_all().await;
        result.cache_invalidated = true;
        result
    }

    /// Mark records touched by writes already in the log
    ///
    /// Used after a restart, when the tracker is empty but the log is not.
    /// Returns how many entries were marked.
    pub async fn restore_pending(&self, mutations: &[QueuedMutation]) -> usize {
        let mut marked = 0;
        for mutation in mutations {
            if mutation.method == WriteMethod::Post {
                continue;
            }
            if let Some(id) = self.tracked_item(&mutation.url) {
                self.tracker.mark(id, mutation.id).await;
                marked += 1;
            }
        }
        marked
    }

    /// A record disappeared on the backend (e.g. a fetch returned 404)
    pub async fn record_deleted_remotely(&self, id: i64) -> ReconciliationResult {
        ReconciliationResult {
            detail_closed: self.detail.close_if_showing(id),
            cache_entries_touched: self.cache.remove_entity_everywhere(id).await,
            ..ReconciliationResult::default()
        }
    }
}

/// The record after an update: what was sent, overlaid with what came back
fn authoritative_record(id: i64, sent: Option<&Value>, returned: Option<&Value>) -> Value {
    let mut record = Value::Object(serde_json::Map::new());
    for part in [sent, returned].into_iter().flatten() {
        if part.is_object() {
            merge_fields(&mut record, part);
        }
    }
    with_id(record, id)
}

fn with_id(mut record: Value, id: i64) -> Value {
    if let Value::Object(fields) = &mut record {
        fields.entry("id").or_insert_with(|| Value::from(id));
    }
    record
}
