//! # Offline Write Queue
//!
//! Single entry point for every mutating call. Writes go straight to the
//! backend while it is reachable and into the durable mutation log while it
//! is not; the caller gets a [`WriteOutcome`] either way and never needs a
//! separate offline code path.
//!
//! ## Architecture
//!
//! - **Write path**: online and log empty → dispatch; otherwise append to the
//!   log, apply the edit optimistically and ask the host for a background sync.
//!   A write made while older ones are still queued is queued too, so it can
//!   never overtake them.
//! - **Replay**: strict FIFO by log id. Success removes the entry, a permanent
//!   rejection moves it to the failure ledger, and a transient error stops
//!   the pass until the next trigger.
//! - **Single replayer**: an in-process lock plus a lease row in SQLite, so
//!   two processes sharing one database never replay the same entry at once.
//! - **Reconciliation**: see [`reconciliation`].
//!
//! ## Key Components
//!
//! - `queue.rs`: outcomes, replay reports and events
//! - `optimistic.rs`: unconfirmed-edit tracking
//! - `detail.rs`: the open detail view
//! - `reconciliation.rs`: applying writes to the cache and the detail view
//!
//! ## Usage
//!
//! ```rust,no_run
//! use complaint_sync::client::offline::OfflineManager;
//! use complaint_sync::shared::WriteMethod;
//! use serde_json::json;
//!
//! # async fn example(manager: OfflineManager) -> Result<(), complaint_sync::client::offline::OfflineError> {
//! let outcome = manager
//!     .write(WriteMethod::Put, "/complaints/1", Some(json!({"status": "closed"})), vec![])
//!     .await?;
//! if outcome.is_pending() {
//!     println!("saved offline, will sync later");
//! }
//! # Ok(())
//! # }
//! ```

pub mod detail;
pub mod optimistic;
pub mod queue;
pub mod reconciliation;

pub use detail::{DetailState, DetailView};
pub use optimistic::OptimisticTracker;
pub use queue::{ReplayReport, SkipReason, SyncEvent, WriteOutcome, ACCEPTED_PENDING_STATUS};
pub use reconciliation::{Reconciler, ReconciliationResult};

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex, OnceCell};
use uuid::Uuid;

use crate::client::api::{ApiRequest, DispatchError, Dispatcher};
use crate::client::cache::ReadCache;
use crate::client::clock::{Clock, SystemClock};
use crate::client::config::Config;
use crate::client::local_db::{Draft, LocalDatabase, LocalDbError, SyncFailure};
use crate::client::sync::background::{BackgroundSync, NoBackgroundSync};
use crate::client::sync::network_monitor::ConnectivityState;
use crate::client::sync::sync_state::SyncStatus;
use crate::shared::{ListPage, ListQuery, NewMutation, QueuedMutation, WriteMethod};

const EVENT_CAPACITY: usize = 256;

/// Errors surfaced by the queue
#[derive(Debug, Error)]
pub enum OfflineError {
    /// A direct write failed after the dispatcher's own recovery
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Storage(#[from] LocalDbError),
}

impl OfflineError {
    /// Whether resending later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            OfflineError::Dispatch(e) => e.is_transient(),
            OfflineError::Storage(_) => false,
        }
    }
}

/// Coordinates the write path, replay and reconciliation
#[derive(Debug)]
pub struct OfflineManager {
    db: LocalDatabase,
    dispatcher: Dispatcher,
    reconciler: Arc<Reconciler>,
    connectivity: watch::Receiver<ConnectivityState>,
    background: Arc<dyn BackgroundSync>,
    events: broadcast::Sender<SyncEvent>,
    replay_lock: Mutex<()>,
    restored: OnceCell<()>,
    owner: String,
    lease_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl OfflineManager {
    pub fn new(
        config: &Config,
        db: LocalDatabase,
        dispatcher: Dispatcher,
        reconciler: Arc<Reconciler>,
        connectivity: watch::Receiver<ConnectivityState>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            dispatcher,
            reconciler,
            connectivity,
            background: Arc::new(NoBackgroundSync),
            events,
            replay_lock: Mutex::new(()),
            restored: OnceCell::new(),
            owner: Uuid::new_v4().to_string(),
            lease_ttl: config.sync_lease(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_background(mut self, background: Arc<dyn BackgroundSync>) -> Self {
        self.background = background;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.db
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        self.reconciler.cache()
    }

    /// Identifies this process in the replay lease
    pub fn owner_id(&self) -> &str {
        &self.owner
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.borrow().effective_online()
    }

    /// Rebuild optimistic tracking from entries a previous run left in the log
    ///
    /// Runs once per manager, before the first enqueue or replay.
    pub async fn restore_pending(&self) -> Result<(), OfflineError> {
        self.restored
            .get_or_try_init(|| async {
                let pending = self.db.list_mutations().await?;
                let marked = self.reconciler.restore_pending(&pending).await;
                if marked > 0 {
                    tracing::info!(marked, "restored pending edits from the mutation log");
                }
                Ok::<_, OfflineError>(())
            })
            .await?;
        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Send a write now, or queue it if that is not possible
    ///
    /// Direct writes return the dispatcher's result unchanged, errors included.
    pub async fn write(
        &self,
        method: WriteMethod,
        url: &str,
        body: Option<Value>,
        headers: Vec<(String, String)>,
    ) -> Result<WriteOutcome, OfflineError> {
        if self.is_online() && self.db.count_mutations().await? == 0 {
            return self.write_direct(method, url, body, headers).await;
        }
        self.enqueue(method, url, body, headers).await
    }

    async fn write_direct(
        &self,
        method: WriteMethod,
        url: &str,
        body: Option<Value>,
        headers: Vec<(String, String)>,
    ) -> Result<WriteOutcome, OfflineError> {
        let request = ApiRequest::new(method.to_http(), url)
            .body(body.clone())
            .headers(headers);
        let response = self.dispatcher.send(request).await?;

        self.reconciler
            .apply_confirmed(method, url, body.as_ref(), &response, None)
            .await;
        self.emit(SyncEvent::Delivered {
            method,
            url: url.to_string(),
            status: response.status,
        });
        Ok(WriteOutcome::Delivered(response))
    }

    async fn enqueue(
        &self,
        method: WriteMethod,
        url: &str,
        body: Option<Value>,
        headers: Vec<(String, String)>,
    ) -> Result<WriteOutcome, OfflineError> {
        self.restore_pending().await?;
        let mut mutation = NewMutation::new(method, url, body, headers);
        mutation.queued_at = self.clock.now();
        let queued = self.db.append_mutation(&mutation).await?;

        self.reconciler.apply_optimistic(&queued).await;
        tracing::info!(mutation_id = queued.id, method = %method, url, "write queued");
        self.emit(SyncEvent::Queued {
            mutation_id: queued.id,
            method,
            url: url.to_string(),
        });

        if !self.background.request_sync() {
            tracing::debug!("background sync unavailable, waiting for next trigger");
        }

        Ok(WriteOutcome::Queued {
            mutation_id: queued.id,
            queued_at: queued.queued_at,
        })
    }

    /// Replay queued writes in order until the log is empty or an entry
    /// fails transiently
    pub async fn replay_pending(&self) -> Result<ReplayReport, OfflineError> {
        let Ok(_running) = self.replay_lock.try_lock() else {
            return Ok(ReplayReport::skipped(SkipReason::AlreadyRunning));
        };
        if !self.is_online() {
            return Ok(ReplayReport::skipped(SkipReason::Offline));
        }
        self.restore_pending().await?;
        if !self
            .db
            .try_acquire_sync_lease(&self.owner, self.lease_ttl, self.clock.now())
            .await?
        {
            tracing::debug!("replay lease held by another process");
            return Ok(ReplayReport::skipped(SkipReason::LeaseHeld));
        }

        let mut report = ReplayReport::default();
        let result = self.replay_in_order(&mut report).await;

        if let Err(e) = self.db.release_sync_lease(&self.owner).await {
            tracing::warn!(error = %e, "could not release replay lease");
        }
        result?;

        report.remaining = self.db.count_mutations().await?;
        if report.deferred.is_none() {
            self.db.set_last_sync_time(self.clock.now()).await?;
        }
        tracing::info!(
            replayed = report.replayed,
            failed = report.failed.len(),
            remaining = report.remaining,
            "replay finished"
        );
        Ok(report)
    }

    async fn replay_in_order(&self, report: &mut ReplayReport) -> Result<(), OfflineError> {
        while let Some(mutation) = self.db.next_mutation().await? {
            // Keep the lease alive for long replays
            if !self
                .db
                .try_acquire_sync_lease(&self.owner, self.lease_ttl, self.clock.now())
                .await?
            {
                report.deferred = Some("replay lease lost".to_string());
                break;
            }

            let request = ApiRequest::new(mutation.method.to_http(), mutation.url.clone())
                .body(mutation.body.clone())
                .headers(mutation.replay_headers());

            match self.dispatcher.send(request).await {
                Ok(response) => {
                    self.db.remove_mutation(mutation.id).await?;
                    self.reconciler
                        .apply_confirmed(
                            mutation.method,
                            &mutation.url,
                            mutation.body.as_ref(),
                            &response,
                            Some(mutation.id),
                        )
                        .await;
                    report.replayed += 1;
                    self.emit(SyncEvent::Replayed {
                        mutation_id: mutation.id,
                        status: response.status,
                    });
                }
                Err(err) if err.is_permanent() => {
                    let failure = self
                        .db
                        .fail_mutation(&mutation, err.status(), &err.to_string())
                        .await?;
                    self.reconciler.apply_failed(&mutation).await;
                    tracing::error!(
                        mutation_id = mutation.id,
                        method = %mutation.method,
                        url = %mutation.url,
                        error = %err,
                        "queued write rejected by backend"
                    );
                    report.failed.push(failure.clone());
                    self.emit(SyncEvent::Failed(failure));
                }
                Err(err) => {
                    tracing::warn!(
                        mutation_id = mutation.id,
                        error = %err,
                        "replay deferred until next trigger"
                    );
                    report.deferred = Some(err.to_string());
                    self.emit(SyncEvent::Deferred {
                        mutation_id: mutation.id,
                        reason: err.to_string(),
                    });
                    break;
                }
            }
        }
        Ok(())
    }

    /// Read a list page through the cache
    pub async fn read_list(&self, path: &str, query: &ListQuery) -> Result<ListPage, DispatchError> {
        self.cache()
            .read_through(query, || self.dispatcher.get_list(path, query))
            .await
    }

    pub async fn pending_mutations(&self) -> Result<Vec<QueuedMutation>, OfflineError> {
        Ok(self.db.list_mutations().await?)
    }

    /// Pending writes queued more than `max_age` ago
    pub async fn stale_mutations(&self, max_age: Duration) -> Result<Vec<QueuedMutation>, OfflineError> {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Ok(self.db.mutations_queued_before(cutoff).await?)
    }

    pub async fn status(&self) -> Result<SyncStatus, OfflineError> {
        Ok(SyncStatus {
            pending: self.db.count_mutations().await?,
            oldest_queued_at: self.db.oldest_mutation_time().await?,
            last_sync_at: self.db.last_sync_time().await?,
            failures: self.db.list_sync_failures().await?.len(),
            connectivity: *self.connectivity.borrow(),
        })
    }

    pub async fn sync_failures(&self) -> Result<Vec<SyncFailure>, OfflineError> {
        Ok(self.db.list_sync_failures().await?)
    }

    pub async fn dismiss_failure(&self, id: i64) -> Result<bool, OfflineError> {
        Ok(self.db.dismiss_sync_failure(id).await?)
    }

    pub async fn save_draft(&self, payload: &Value) -> Result<Draft, OfflineError> {
        Ok(self.db.save_draft(payload).await?)
    }

    pub async fn load_draft(&self) -> Result<Option<Draft>, OfflineError> {
        Ok(self.db.load_draft().await?)
    }

    pub async fn clear_draft(&self) -> Result<bool, OfflineError> {
        Ok(self.db.clear_draft().await?)
    }

    /// Submit the saved draft as a new record at `url`
    ///
    /// The draft is cleared once the write is delivered or queued, and kept
    /// if it fails. Returns `None` when there is no draft.
    pub async fn submit_draft(&self, url: &str) -> Result<Option<WriteOutcome>, OfflineError> {
        let Some(draft) = self.db.load_draft().await? else {
            return Ok(None);
        };
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        let outcome = self
            .write(WriteMethod::Post, url, Some(draft.payload), headers)
            .await?;
        self.db.clear_draft().await?;
        Ok(Some(outcome))
    }
}
