//! Revision model.
//!
//! A revision is an immutable snapshot of the data submitted when an entry
//! was saved. Revisions reference their resource polymorphically through
//! `(resource_type, resource_id)`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Resource type tag of entry snapshots.
pub const ENTRY_RESOURCE_TYPE: &str = "entry";

/// Revision record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Revision {
    pub id: Uuid,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub content_type_id: Uuid,

    /// `None` once the author account has been deleted.
    pub author_id: Option<Uuid>,

    /// Author display name captured when the revision was created.
    pub author_name: String,

    /// Submitted payload, verbatim.
    pub data: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a revision.
#[derive(Debug, Clone)]
pub struct NewRevision {
    pub resource_type: String,
    pub resource_id: Uuid,
    pub content_type_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub data: serde_json::Value,
}

const REVISION_COLUMNS: &str =
    "id, resource_type, resource_id, content_type_id, author_id, author_name, data, created_at";

impl Revision {
    /// Find a revision by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let revision = sqlx::query_as::<_, Revision>(&format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch revision")?;

        Ok(revision)
    }

    /// Revisions of an entry, newest first.
    pub async fn list_for_entry(pool: &PgPool, entry_id: Uuid) -> Result<Vec<Self>> {
        let revisions = sqlx::query_as::<_, Revision>(&format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE resource_type = $1 AND resource_id = $2 ORDER BY created_at DESC, id DESC"
        ))
        .bind(ENTRY_RESOURCE_TYPE)
        .bind(entry_id)
        .fetch_all(pool)
        .await
        .context("failed to list revisions")?;

        Ok(revisions)
    }

    /// Whether this revision is a snapshot of the given entry.
    pub fn belongs_to_entry(&self, entry_id: Uuid) -> bool {
        self.resource_type == ENTRY_RESOURCE_TYPE && self.resource_id == entry_id
    }

    /// IDs of an entry's revisions, newest first, windowed by offset/limit.
    pub async fn ids_for_entry(
        conn: &mut PgConnection,
        entry_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM revisions
            WHERE resource_type = $1 AND resource_id = $2
            ORDER BY created_at DESC, id DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(ENTRY_RESOURCE_TYPE)
        .bind(entry_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .context("failed to fetch revision ids")?;

        Ok(ids)
    }

    /// Delete revisions by ID.
    pub async fn delete_many(conn: &mut PgConnection, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM revisions WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *conn)
            .await
            .context("failed to delete revisions")?;

        Ok(result.rows_affected())
    }

    /// Insert a new revision.
    pub async fn create(conn: &mut PgConnection, input: NewRevision) -> Result<Self> {
        let revision = sqlx::query_as::<_, Revision>(&format!(
            r#"
            INSERT INTO revisions (id, resource_type, resource_id, content_type_id, author_id, author_name, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {REVISION_COLUMNS}
            "#
        ))
        .bind(Uuid::now_v7())
        .bind(&input.resource_type)
        .bind(input.resource_id)
        .bind(input.content_type_id)
        .bind(input.author_id)
        .bind(&input.author_name)
        .bind(&input.data)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await
        .context("failed to insert revision")?;

        Ok(revision)
    }
}
