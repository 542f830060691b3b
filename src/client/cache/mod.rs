//! # Read Cache
//!
//! Query-keyed, in-memory cache of complaint list pages.
//!
//! An entry is served only while both hold:
//!
//! - it is younger than the TTL (default 5 minutes);
//! - no [`ReadCache::invalidate_all`] happened after it was stored.
//!
//! Invalidation empties the map and bumps a refresh epoch in one step under
//! the write lock. The epoch lets a fetch that was in flight across an
//! invalidation see that its result is already out of date. Expired entries
//! are swept whenever a new page is stored.
//!
//! Local edits reach already-rendered pages through
//! [`ReadCache::update_entity_in_place`] and
//! [`ReadCache::remove_entity_everywhere`], without a refetch.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use complaint_sync::client::cache::ReadCache;
//! use complaint_sync::shared::{ListPage, ListQuery};
//! use std::time::Duration;
//!
//! # async fn example(fetch: impl std::future::Future<Output = Result<ListPage, ()>>) -> Result<(), ()> {
//! let cache = ReadCache::new(Duration::from_secs(300));
//! let query = ListQuery::new().filter("status", ["open", "closed"]);
//! let page = cache.read_through(&query, || fetch).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::client::clock::{Clock, SystemClock};
use crate::shared::{merge_fields, record_id, CacheKey, ListPage, ListQuery};

#[derive(Debug, Clone)]
struct CacheEntry {
    page: ListPage,
    stored_at: DateTime<Utc>,
    epoch: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    epoch: u64,
    last_refresh: Option<DateTime<Utc>>,
}

/// Read cache for list queries
#[derive(Debug)]
pub struct ReadCache {
    inner: RwLock<CacheInner>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached page for `query`, if still valid
    pub async fn get(&self, query: &ListQuery) -> Option<ListPage> {
        let key = query.cache_key();
        let now = self.clock.now();
        let mut inner = self.inner.write().await;

        let valid = match inner.entries.get(&key) {
            Some(entry) => entry.epoch == inner.epoch && self.is_fresh(entry, now),
            None => {
                tracing::debug!(key = %key, "cache miss");
                return None;
            }
        };

        if valid {
            tracing::debug!(key = %key, "cache hit");
            inner.entries.get(&key).map(|entry| entry.page.clone())
        } else {
            tracing::debug!(key = %key, "cache entry stale, evicting");
            inner.entries.remove(&key);
            None
        }
    }

    /// Store or overwrite the page for `query`
    pub async fn put(&self, query: &ListQuery, page: ListPage) {
        let key = query.cache_key();
        let stored_at = self.clock.now();
        let mut inner = self.inner.write().await;
        self.sweep_expired(&mut inner, stored_at);
        let epoch = inner.epoch;
        inner.entries.insert(
            key,
            CacheEntry {
                page,
                stored_at,
                epoch,
            },
        );
    }

    /// Mark everything cached so far as stale
    pub async fn invalidate_all(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        inner.epoch += 1;
        inner.last_refresh = Some(now);
        let dropped = inner.entries.len();
        inner.entries.clear();
        tracing::debug!(epoch = inner.epoch, dropped, "cache invalidated");
    }

    /// When [`invalidate_all`](Self::invalidate_all) last ran
    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_refresh
    }

    /// Merge `updated` into every cached record with the same id
    ///
    /// Object fields are merged key by key; a non-object record is replaced.
    /// Returns how many entries were touched.
    pub async fn update_entity_in_place(&self, updated: &Value) -> usize {
        let Some(id) = record_id(updated) else {
            return 0;
        };

        let mut inner = self.inner.write().await;
        let mut touched = 0;
        for entry in inner.entries.values_mut() {
            let mut hit = false;
            for item in entry
                .page
                .items
                .iter_mut()
                .filter(|item| record_id(item) == Some(id))
            {
                merge_fields(item, updated);
                hit = true;
            }
            if hit {
                touched += 1;
            }
        }
        touched
    }

    /// Remove the record with `id` from every cached page
    ///
    /// Each page that lost a record has its total decremented. Returns how many
    /// entries were touched.
    pub async fn remove_entity_everywhere(&self, id: i64) -> usize {
        let mut inner = self.inner.write().await;
        let mut touched = 0;
        for entry in inner.entries.values_mut() {
            let before = entry.page.items.len();
            entry.page.items.retain(|item| record_id(item) != Some(id));
            let removed = before - entry.page.items.len();
            for _ in 0..removed {
                entry.page.pagination.decrement_total();
            }
            if removed > 0 {
                touched += 1;
            }
        }
        touched
    }

    /// Serve from cache, or call `fetch` and cache its result
    ///
    /// A fetch that started before an `invalidate_all` is returned to the
    /// caller but not cached, since it may predate the change that caused
    /// the invalidation.
    pub async fn read_through<F, Fut, E>(&self, query: &ListQuery, fetch: F) -> Result<ListPage, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ListPage, E>>,
    {
        if let Some(page) = self.get(query).await {
            return Ok(page);
        }

        let epoch = self.inner.read().await.epoch;
        let page = fetch().await?;

        let stored_at = self.clock.now();
        let mut inner = self.inner.write().await;
        if inner.epoch == epoch {
            self.sweep_expired(&mut inner, stored_at);
            inner.entries.insert(
                query.cache_key(),
                CacheEntry {
                    page: page.clone(),
                    stored_at,
                    epoch,
                },
            );
        } else {
            tracing::debug!(key = %query.cache_key(), "discarding fetch that raced an invalidation");
        }
        Ok(page)
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.inner.write().await.entries.clear();
    }

    /// Stored entries, valid or not
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn sweep_expired(&self, inner: &mut CacheInner, now: DateTime<Utc>) {
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| self.is_fresh(entry, now));
        let swept = before - inner.entries.len();
        if swept > 0 {
            tracing::debug!(swept, "expired cache entries dropped");
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match (now - entry.stored_at).to_std() {
            Ok(age) => age < self.ttl,
            // Stored "in the future" after a clock step backwards
            Err(_) => true,
        }
    }
}
