//! # Sync Metadata Operations
//!
//! Bookkeeping around replay:
//!
//! - **Sync Metadata**: key/value pairs such as the last successful sync time
//! - **Sync Lease**: a time-limited claim so only one process replays the log
//! - **Failure Ledger**: writes the backend permanently rejected, moved out of
//!   the log and kept until the user dismisses them

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use std::time::Duration;

use super::{decode_time, encode_time, LocalDatabase, Result};
use crate::shared::{QueuedMutation, WriteMethod};

const LAST_SYNC_KEY: &str = "last_sync_time";

/// A queued write the backend refused
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub id: i64,
    pub mutation_id: i64,
    pub method: WriteMethod,
    pub url: String,
    pub body: Option<Value>,
    /// HTTP status, when the failure came from a response
    pub status: Option<u16>,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

impl LocalDatabase {
    /// Set sync metadata value
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(encode_time(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get sync metadata value
    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM sync_metadata WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_sync_metadata(LAST_SYNC_KEY, &encode_time(at)).await
    }

    pub async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_sync_metadata(LAST_SYNC_KEY)
            .await?
            .map(|raw| decode_time("sync_metadata", &raw))
            .transpose()
    }

    /// Claim the replay lease for `owner` until `now + ttl`
    ///
    /// Succeeds when nobody holds the lease, when it has expired, or when
    /// `owner` already holds it (which extends it). The check and the claim
    /// happen in one statement, so two processes cannot both win.
    pub async fn try_acquire_sync_lease(
        &self,
        owner: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(30));
        let result = sqlx::query(
            "INSERT INTO sync_lease (id, owner, expires_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET owner = excluded.owner, expires_at = excluded.expires_at
             WHERE sync_lease.owner = excluded.owner OR sync_lease.expires_at <= ?3",
        )
        .bind(owner)
        .bind(encode_time(now + ttl))
        .bind(encode_time(now))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Give up the lease if `owner` holds it
    pub async fn release_sync_lease(&self, owner: &str) -> Result<()> {
        sqlx::query("DELETE FROM sync_lease WHERE id = 1 AND owner = ?")
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Current lease holder, if the lease has not expired
    pub async fn sync_lease_holder(&self, now: DateTime<Utc>) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT owner FROM sync_lease WHERE id = 1 AND expires_at > ?")
                .bind(encode_time(now))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(owner,)| owner))
    }

    /// Move a permanently rejected write from the log into the failure ledger
    ///
    /// Both happen in one transaction, so the write is never in neither place.
    pub async fn fail_mutation(
        &self,
        mutation: &QueuedMutation,
        status: Option<u16>,
        message: &str,
    ) -> Result<SyncFailure> {
        let failed_at = encode_time(Utc::now());
        let body = mutation
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO sync_failures (mutation_id, method, url, body, status, message, failed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(mutation.id)
        .bind(mutation.method.as_str())
        .bind(&mutation.url)
        .bind(body)
        .bind(status.map(i64::from))
        .bind(message)
        .bind(&failed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM mutation_log WHERE id = ?")
            .bind(mutation.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(SyncFailure {
            id: result.last_insert_rowid(),
            mutation_id: mutation.id,
            method: mutation.method,
            url: mutation.url.clone(),
            body: mutation.body.clone(),
            status,
            message: message.to_string(),
            failed_at: decode_time("sync_failures", &failed_at)?,
        })
    }

    /// Rejected writes, oldest first
    pub async fn list_sync_failures(&self) -> Result<Vec<SyncFailure>> {
        let rows = sqlx::query(
            "SELECT id, mutation_id, method, url, body, status, message, failed_at
             FROM sync_failures
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut failures = Vec::with_capacity(rows.len());
        for row in rows {
            let method: String = row.try_get("method")?;
            let Ok(method) = method.parse::<WriteMethod>() else {
                tracing::warn!(method = %method, "skipping failure entry with unknown method");
                continue;
            };
            let body: Option<String> = row.try_get("body")?;
            let status: Option<i64> = row.try_get("status")?;
            let failed_at: String = row.try_get("failed_at")?;

            failures.push(SyncFailure {
                id: row.try_get("id")?,
                mutation_id: row.try_get("mutation_id")?,
                method,
                url: row.try_get("url")?,
                body: body.map(|raw| serde_json::from_str(&raw)).transpose()?,
                status: status.and_then(|s| u16::try_from(s).ok()),
                message: row.try_get("message")?,
                failed_at: decode_time("sync_failures", &failed_at)?,
            });
        }
        Ok(failures)
    }

    /// Remove one ledger entry; returns whether it existed
    pub async fn dismiss_sync_failure(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sync_failures WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
