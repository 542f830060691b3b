//! # Background Sync Registration
//!
//! The queue asks the host to "wake me to flush the log" after it persists a
//! write. Hosts without such a facility use [`NoBackgroundSync`]; replay then
//! waits for the next explicit trigger (interval tick, reachability change or
//! app foreground).

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Host hook for waking replay
pub trait BackgroundSync: Send + Sync + Debug {
    /// Ask for a replay as soon as possible; returns false if unsupported
    fn request_sync(&self) -> bool;
}

/// Background sync is unavailable on this host
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackgroundSync;

impl BackgroundSync for NoBackgroundSync {
    fn request_sync(&self) -> bool {
        false
    }
}

/// In-process wakeup for the sync service's loop
///
/// Requests made while nobody is waiting are remembered as a single pending
/// permit, so a burst of writes wakes the loop once.
#[derive(Debug, Default)]
pub struct NotifySync {
    notify: Arc<Notify>,
    requests: AtomicU64,
}

impl NotifySync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the next request
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Wake the loop without counting it as a write-path request
    pub fn request_sync_now(&self) {
        self.notify.notify_one();
    }

    /// Requests made so far
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

impl BackgroundSync for NotifySync {
    fn request_sync(&self) -> bool {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        true
    }
}
