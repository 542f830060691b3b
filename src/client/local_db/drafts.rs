//! Complaint draft slot
//!
//! One in-progress complaint form is kept locally so it survives a reload.
//! Saving overwrites the previous draft.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{decode_time, encode_time, LocalDatabase, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
}

impl LocalDatabase {
    pub async fn save_draft(&self, payload: &Value) -> Result<Draft> {
        let updated_at = encode_time(Utc::now());
        sqlx::query(
            "INSERT INTO drafts (id, payload, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(serde_json::to_string(payload)?)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(Draft {
            payload: payload.clone(),
            updated_at: decode_time("drafts", &updated_at)?,
        })
    }

    pub async fn load_draft(&self) -> Result<Option<Draft>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT payload, updated_at FROM drafts WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((payload, updated_at)) => Ok(Some(Draft {
                payload: serde_json::from_str(&payload)?,
                updated_at: decode_time("drafts", &updated_at)?,
            })),
            None => Ok(None),
        }
    }

    /// Returns whether a draft existed
    pub async fn clear_draft(&self) -> Result<bool> {
        let result = sqlx::query("DELETE FROM drafts WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
