//! Client Runtime
//!
//! Everything that runs inside the complaint client process: HTTP dispatch,
//! local storage, the read cache, the offline write queue and the sync loop.
//! [`SyncClient`] wires them together from one [`Config`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod local_db;
pub mod offline;
pub mod sync;

pub use config::Config;

use std::sync::Arc;
use thiserror::Error;

use crate::shared::ConfigError;
use api::Dispatcher;
use auth::{AuthSession, CredentialStore, MemoryCredentialStore};
use cache::ReadCache;
use local_db::{LocalDatabase, LocalDbError};
use offline::{DetailView, OfflineManager, Reconciler};
use sync::{ConnectivityMonitor, NotifySync, SyncService};

/// Errors while assembling the client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] LocalDbError),
}

/// A fully wired sync client
#[derive(Debug)]
pub struct SyncClient {
    config: Config,
    session: Arc<AuthSession>,
    monitor: Arc<ConnectivityMonitor>,
    manager: Arc<OfflineManager>,
    sync: SyncService,
}

impl SyncClient {
    /// Open the configured database and build every component, with an
    /// in-memory credential store
    pub async fn open(config: Config) -> Result<Self, ClientError> {
        Self::open_with_store(config, Arc::new(MemoryCredentialStore::new())).await
    }

    pub async fn open_with_store(
        config: Config,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        let db = LocalDatabase::open(config.database_path()).await?;
        Self::assemble(config, store, db)
    }

    /// Build around an already opened database
    pub fn assemble(
        config: Config,
        store: Arc<dyn CredentialStore>,
        db: LocalDatabase,
    ) -> Result<Self, ClientError> {
        let session = Arc::new(AuthSession::from_config(&config, store)?);
        let dispatcher = Dispatcher::new(&config, Arc::clone(&session))?;
        let monitor = Arc::new(ConnectivityMonitor::new(&config)?);

        let reconciler = Arc::new(Reconciler::new(
            Arc::new(ReadCache::new(config.cache_ttl())),
            Arc::new(DetailView::new()),
        ));
        let wakeup = Arc::new(NotifySync::new());
        let manager = Arc::new(
            OfflineManager::new(&config, db, dispatcher, reconciler, monitor.subscribe())
                .with_background(wakeup.clone()),
        );
        let sync = SyncService::new(
            Arc::clone(&manager),
            wakeup,
            monitor.subscribe(),
            config.sync_interval(),
        );

        Ok(Self {
            config,
            session,
            monitor,
            manager,
            sync,
        })
    }

    /// Start probing and the replay loop
    pub fn start(&self) {
        self.monitor.start();
        self.sync.start();
    }

    pub fn stop(&self) {
        self.sync.stop();
        self.monitor.stop();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn offline(&self) -> &Arc<OfflineManager> {
        &self.manager
    }

    pub fn sync(&self) -> &SyncService {
        &self.sync
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        self.manager.cache()
    }

    pub fn detail(&self) -> &Arc<DetailView> {
        self.manager.reconciler().detail()
    }
}
