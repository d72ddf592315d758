//! Entry publication statuses.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Status of a newly created entry when none is submitted.
pub const DEFAULT_ENTRY_STATUS_ID: i16 = 1;

/// Entry status record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntryStatus {
    pub id: i16,
    pub name: String,
}

impl EntryStatus {
    /// List all statuses ordered by id.
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let statuses =
            sqlx::query_as::<_, EntryStatus>("SELECT id, name FROM entry_statuses ORDER BY id ASC")
                .fetch_all(pool)
                .await
                .context("failed to list entry statuses")?;

        Ok(statuses)
    }
}
