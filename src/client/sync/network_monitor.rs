//! # Network Monitor
//!
//! Produces the single "can we talk to the backend" signal the rest of the
//! client trusts before deciding to send or queue.
//!
//! ## Signals
//!
//! - **Transport**: the host reports link up/down through
//!   [`ConnectivityMonitor::set_transport_online`]; applied immediately.
//! - **Probe**: a GET to the health endpoint, time-boxed, once at start and
//!   then on a fixed interval. Any error or non-2xx marks the backend
//!   unreachable until a later probe succeeds. Probes are never retried.
//!
//! Observers use a `watch` channel and are only woken when a value actually
//! changes.

use reqwest::{Client, Url};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::config::Config;
use crate::shared::ConfigError;

/// Reachability as seen by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    /// Transport-level link status
    pub is_online: bool,
    /// Result of the last health probe
    pub backend_reachable: bool,
}

impl ConnectivityState {
    /// Both the link is up and the backend answered the last probe
    pub fn effective_online(&self) -> bool {
        self.is_online && self.backend_reachable
    }
}

impl Default for ConnectivityState {
    /// Link assumed up, backend unknown until the first probe
    fn default() -> Self {
        Self {
            is_online: true,
            backend_reachable: false,
        }
    }
}

#[derive(Debug)]
pub struct ConnectivityMonitor {
    client: Client,
    health_url: Url,
    interval: Duration,
    state: watch::Sender<ConnectivityState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let health_url = Url::parse(&config.health_url())
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.health_url(), e)))?;
        let client = Client::builder()
            .timeout(config.probe_timeout())
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "probe_timeout_secs",
                reason: e.to_string(),
            })?;
        let (state, _) = watch::channel(ConnectivityState::default());

        Ok(Self {
            client,
            health_url,
            interval: config.probe_interval(),
            state,
            task: Mutex::new(None),
        })
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn is_effectively_online(&self) -> bool {
        self.state().effective_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    /// Transport online/offline event from the host
    pub fn set_transport_online(&self, online: bool) {
        self.update(|state| state.is_online = online);
    }

    /// Record a reachability result obtained elsewhere
    pub fn set_backend_reachable(&self, reachable: bool) {
        self.update(|state| state.backend_reachable = reachable);
    }

    fn update(&self, apply: impl FnOnce(&mut ConnectivityState)) {
        let mut effective_change = None;
        self.state.send_if_modified(|state| {
            let before = *state;
            apply(state);
            if before.effective_online() != state.effective_online() {
                effective_change = Some(state.effective_online());
            }
            before != *state
        });

        match effective_change {
            Some(true) => tracing::info!("backend reachable"),
            Some(false) => tracing::warn!("backend unreachable, writes will be queued"),
            None => {}
        }
    }

    /// Run one health check and record the result
    pub async fn probe_once(&self) -> bool {
        let reachable = match self.client.get(self.health_url.clone()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %self.health_url, error = %e, "health probe failed");
                false
            }
        };
        self.set_backend_reachable(reachable);
        reachable
    }

    /// Probe now and then every interval until [`stop`](Self::stop)
    ///
    /// Calling `start` while already running does nothing.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut task) = self.task.lock() else {
            return;
        };
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let monitor: Weak<Self> = Arc::downgrade(self);
        let period = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.probe_once().await;
            }
        }));
        tracing::info!(url = %self.health_url, interval_secs = period.as_secs(), "connectivity monitor started");
    }

    pub fn stop(&self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
                tracing::info!("connectivity monitor stopped");
            }
        }
    }

    /// Call `callback` each time effective reachability flips
    ///
    /// The returned task ends when the monitor is dropped; abort it to
    /// unsubscribe earlier.
    pub fn on_reachability_change<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn(ConnectivityState) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let mut last = rx.borrow_and_update().effective_online();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                if state.effective_online() != last {
                    last = state.effective_online();
                    callback(state);
                }
            }
        })
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
