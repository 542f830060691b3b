//! # Background Sync Service
//!
//! Drives replay of the offline queue. A pass over the log runs on any of:
//!
//! - a request from the write path (through [`NotifySync`]);
//! - the backend becoming reachable;
//! - a fixed interval tick, so an entry deferred by a transient error is
//!   retried later rather than in a tight loop;
//! - the host reporting that the app came to the foreground.
//!
//! ## Key Components
//!
//! - `network_monitor.rs`: transport signal plus active health probe
//! - `background.rs`: host wakeup registration
//! - `sync_state.rs`: status snapshot
//!
//! ## Usage
//!
//! ```rust,no_run
//! use complaint_sync::client::SyncClient;
//! use complaint_sync::client::Config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SyncClient::open(Config::new()).await?;
//! client.start();
//!
//! let report = client.sync().force_sync().await?;
//! println!("replayed {}", report.replayed);
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod network_monitor;
pub mod sync_state;

pub use background::{BackgroundSync, NoBackgroundSync, NotifySync};
pub use network_monitor::{ConnectivityMonitor, ConnectivityState};
pub use sync_state::SyncStatus;

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::offline::{OfflineError, OfflineManager, ReplayReport};

/// Owns the replay loop
#[derive(Debug)]
pub struct SyncService {
    manager: Arc<OfflineManager>,
    wakeup: Arc<NotifySync>,
    connectivity: watch::Receiver<ConnectivityState>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    pub fn new(
        manager: Arc<OfflineManager>,
        wakeup: Arc<NotifySync>,
        connectivity: watch::Receiver<ConnectivityState>,
        interval: Duration,
    ) -> Self {
        Self {
            manager,
            wakeup,
            connectivity,
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn manager(&self) -> &Arc<OfflineManager> {
        &self.manager
    }

    /// Start the replay loop; does nothing if it is already running
    pub fn start(&self) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let manager = Arc::clone(&self.manager);
        let wakeup = Arc::clone(&self.wakeup);
        let mut connectivity = self.connectivity.clone();
        let period = self.interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = wakeup.notified() => {}
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if !connectivity.borrow_and_update().effective_online() {
                            continue;
                        }
                        tracing::info!("backend reachable again, replaying queued writes");
                    }
                }

                match manager.replay_pending().await {
                    Ok(report) => log_report(&report),
                    Err(e) => tracing::error!(error = %e, "replay failed"),
                }
            }
            tracing::debug!("sync loop exited");
        }));
        tracing::info!(interval_secs = period.as_secs(), "sync service started");
    }

    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                tracing::info!("sync service stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Replay now, on the caller's task
    pub async fn force_sync(&self) -> Result<ReplayReport, OfflineError> {
        self.manager.replay_pending().await
    }

    /// The app came to the foreground
    pub fn on_foreground(&self) {
        self.wakeup.request_sync_now();
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_report(report: &ReplayReport) {
    if !report.ran() {
        tracing::debug!(reason = ?report.skipped, "replay skipped");
        return;
    }
    if report.replayed > 0 || !report.failed.is_empty() {
        tracing::info!(
            replayed = report.replayed,
            failed = report.failed.len(),
            remaining = report.remaining,
            "queued writes synced"
        );
    }
}
