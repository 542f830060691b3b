//! # Local Database Module
//!
//! SQLite storage that survives restarts. It holds the pending-write log, the
//! single complaint draft, sync metadata, the cross-process replay lease and
//! a ledger of writes the backend permanently rejected.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool and schema management
//! - `schema.rs`: schema version constants and migration helpers
//! - `mutations.rs`: the ordered mutation log
//! - `drafts.rs`: the single-slot complaint draft
//! - `sync.rs`: sync metadata, replay lease and failure ledger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use complaint_sync::client::local_db::LocalDatabase;
//! use complaint_sync::shared::{NewMutation, WriteMethod};
//!
//! # async fn example() -> Result<(), complaint_sync::client::local_db::LocalDbError> {
//! let db = LocalDatabase::open_default().await?;
//!
//! let queued = db
//!     .append_mutation(&NewMutation::new(WriteMethod::Put, "/complaints/1", None, vec![]))
//!     .await?;
//!
//! for mutation in db.list_mutations().await? {
//!     println!("{} {} {}", mutation.id, mutation.method, mutation.url);
//! }
//! db.remove_mutation(queued.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod drafts;
pub mod mutations;
pub mod schema;
pub mod sync;

pub use drafts::Draft;
pub use sync::SyncFailure;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from the local store
#[derive(Debug, Error)]
pub enum LocalDbError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not encode or decode stored JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("could not prepare database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },
}

/// Result type for local database operations
pub type Result<T> = std::result::Result<T, LocalDbError>;

/// Local database connection manager
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database file at `path`
    ///
    /// Uses WAL mode so a second process can read while another writes.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), "opened local database");
        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Open the database at the platform data directory
    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_path()).await
    }

    /// A private in-memory database, mainly for tests
    ///
    /// Limited to one connection that never expires, since every new
    /// connection to `:memory:` would see an empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Platform-specific location of the database file
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("complaint-sync");
        path.push("local.db");
        path
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create all tables and record applied migrations
    async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("schema.sql"))
            .execute(&self.pool)
            .await?;

        self.run_migrations().await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current = self.schema_version().await?;
        for (version, tables) in schema::pending_after(current) {
            // schema.sql already created the tables; record the version.
            sqlx::query(
                "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?, ?)",
            )
            .bind(version)
            .bind(encode_time(Utc::now()))
            .execute(&self.pool)
            .await?;
            tracing::info!(version, tables, "applied local schema migration");
        }

        Ok(())
    }

    /// Highest applied migration version, 0 for a fresh database
    pub async fn schema_version(&self) -> Result<i32> {
        let (version,): (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text
pub(crate) fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(table: &'static str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| LocalDbError::Corrupt {
            table,
            message: format!("bad timestamp '{}': {}", raw, e),
        })
}
