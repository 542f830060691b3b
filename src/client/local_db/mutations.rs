//! # Mutation Log
//!
//! Durable, ordered record of writes awaiting delivery. Ids come from an
//! `AUTOINCREMENT` column, so they only ever grow: an entry appended after a
//! removal never reuses an older id, and `ORDER BY id` is enqueue order.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{decode_time, encode_time, LocalDatabase, LocalDbError, Result};
use crate::shared::{NewMutation, QueuedMutation, WriteMethod};

const TABLE: &str = "mutation_log";

impl LocalDatabase {
    /// Persist a write and return it with its assigned id
    ///
    /// The entry is committed before this returns.
    pub async fn append_mutation(&self, mutation: &NewMutation) -> Result<QueuedMutation> {
        let body = mutation
            .body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let headers = serde_json::to_string(&mutation.headers)?;
        let queued_at = encode_time(mutation.queued_at);

        let result = sqlx::query(
            "INSERT INTO mutation_log (method, url, body, headers, idempotency_key, queued_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(mutation.method.as_str())
        .bind(&mutation.url)
        .bind(body)
        .bind(headers)
        .bind(mutation.idempotency_key.to_string())
        .bind(&queued_at)
        .execute(&self.pool)
        .await?;

        let queued = QueuedMutation {
            id: result.last_insert_rowid(),
            method: mutation.method,
            url: mutation.url.clone(),
            body: mutation.body.clone(),
            headers: mutation.headers.clone(),
            idempotency_key: mutation.idempotency_key,
            queued_at: decode_time(TABLE, &queued_at)?,
        };
        tracing::debug!(id = queued.id, method = %queued.method, url = %queued.url, "mutation queued");
        Ok(queued)
    }

    /// All pending entries, oldest first
    pub async fn list_mutations(&self) -> Result<Vec<QueuedMutation>> {
        let rows = sqlx::query(
            "SELECT id, method, url, body, headers, idempotency_key, queued_at
             FROM mutation_log
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(mutation_from_row).collect()
    }

    /// The entry replay should attempt next
    pub async fn next_mutation(&self) -> Result<Option<QueuedMutation>> {
        let row = sqlx::query(
            "SELECT id, method, url, body, headers, idempotency_key, queued_at
             FROM mutation_log
             ORDER BY id ASC
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(mutation_from_row).transpose()
    }

    /// Delete one entry; removing an id that is already gone is not an error
    pub async fn remove_mutation(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mutation_log WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_mutations(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM mutation_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// When the oldest pending entry was queued
    pub async fn oldest_mutation_time(&self) -> Result<Option<DateTime<Utc>>> {
        let (oldest,): (Option<String>,) =
            sqlx::query_as("SELECT MIN(queued_at) FROM mutation_log")
                .fetch_one(&self.pool)
                .await?;
        oldest.map(|raw| decode_time(TABLE, &raw)).transpose()
    }

    /// Entries queued before `cutoff`, oldest first
    pub async fn mutations_queued_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<QueuedMutation>> {
        let rows = sqlx::query(
            "SELECT id, method, url, body, headers, idempotency_key, queued_at
             FROM mutation_log
             WHERE queued_at < ?
             ORDER BY id ASC",
        )
        .bind(encode_time(cutoff))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(mutation_from_row).collect()
    }
}

fn mutation_from_row(row: &SqliteRow) -> Result<QueuedMutation> {
    let method: String = row.try_get("method")?;
    let method: WriteMethod = method.parse().map_err(|e| LocalDbError::Corrupt {
        table: TABLE,
        message: format!("{}", e),
    })?;

    let body: Option<String> = row.try_get("body")?;
    let body = body.map(|raw| serde_json::from_str(&raw)).transpose()?;

    let headers: String = row.try_get("headers")?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers)?;

    let key: String = row.try_get("idempotency_key")?;
    let idempotency_key = Uuid::parse_str(&key).map_err(|e| LocalDbError::Corrupt {
        table: TABLE,
        message: format!("bad idempotency key '{}': {}", key, e),
    })?;

    let queued_at: String = row.try_get("queued_at")?;

    Ok(QueuedMutation {
        id: row.try_get("id")?,
        method,
        url: row.try_get("url")?,
        body,
        headers,
        idempotency_key,
        queued_at: decode_time(TABLE, &queued_at)?,
    })
}
