//! Entry model and persistence.
//!
//! Entries are the content records of the admin panel. Base attributes live
//! in `entries`; dynamic field values live in `entry_field_values`, keyed by
//! the content type field they belong to.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::entry_status::DEFAULT_ENTRY_STATUS_ID;
use super::revision::ENTRY_RESOURCE_TYPE;

/// Name of the unique index guarding `url_title` within a content type.
pub const URL_TITLE_UNIQUE_INDEX: &str = "entries_content_type_url_title_key";

/// Entry record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: Uuid,
    pub content_type_id: Uuid,
    pub title: String,
    pub url_title: Option<String>,
    pub entry_status_id: i16,
    pub author_id: Option<Uuid>,
    pub meta_title: Option<String>,
    pub meta_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scalar attributes applied to an entry on save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryAttributes {
    pub title: String,
    pub url_title: Option<String>,
    pub entry_status_id: Option<i16>,
    pub author_id: Option<Uuid>,
    pub meta_title: Option<String>,
    pub meta_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

const ENTRY_COLUMNS: &str = "id, content_type_id, title, url_title, entry_status_id, author_id, meta_title, meta_keywords, meta_description, created_at, updated_at";

impl Entry {
    /// A not-yet-persisted entry of the given content type.
    pub fn new(content_type_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            content_type_id,
            title: String::new(),
            url_title: None,
            entry_status_id: DEFAULT_ENTRY_STATUS_ID,
            author_id: None,
            meta_title: None,
            meta_keywords: None,
            meta_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply submitted attributes. Unset optional attributes keep their value.
    pub fn apply(&mut self, attrs: EntryAttributes) {
        self.title = attrs.title;
        self.url_title = attrs.url_title;
        if let Some(status) = attrs.entry_status_id {
            self.entry_status_id = status;
        }
        self.author_id = attrs.author_id;
        self.meta_title = attrs.meta_title;
        self.meta_keywords = attrs.meta_keywords;
        self.meta_description = attrs.meta_description;
        if let Some(created_at) = attrs.created_at {
            self.created_at = created_at;
        }
    }

    /// Find an entry by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch entry by id")?;

        Ok(entry)
    }

    /// Find the entries with the given IDs; unknown IDs are ignored.
    pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ANY($1) ORDER BY title"
        ))
        .bind(ids)
        .fetch_all(pool)
        .await
        .context("failed to fetch entries")?;

        Ok(entries)
    }

    /// Insert or update the entry row.
    ///
    /// Returns whether a new row was created.
    pub async fn save(&mut self, conn: &mut PgConnection) -> Result<bool> {
        self.updated_at = Utc::now();

        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO entries (id, content_type_id, title, url_title, entry_status_id, author_id,
                                 meta_title, meta_keywords, meta_description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                content_type_id = EXCLUDED.content_type_id,
                title = EXCLUDED.title,
                url_title = EXCLUDED.url_title,
                entry_status_id = EXCLUDED.entry_status_id,
                author_id = EXCLUDED.author_id,
                meta_title = EXCLUDED.meta_title,
                meta_keywords = EXCLUDED.meta_keywords,
                meta_description = EXCLUDED.meta_description,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0)
            "#,
        )
        .bind(self.id)
        .bind(self.content_type_id)
        .bind(&self.title)
        .bind(&self.url_title)
        .bind(self.entry_status_id)
        .bind(self.author_id)
        .bind(&self.meta_title)
        .bind(&self.meta_keywords)
        .bind(&self.meta_description)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(&mut *conn)
        .await
        .context("failed to save entry")?;

        Ok(inserted)
    }

    /// Whether another entry of the content type already uses `url_title`.
    pub async fn url_title_taken(
        pool: &PgPool,
        content_type_id: Uuid,
        url_title: &str,
        except_id: Option<Uuid>,
    ) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM entries
                WHERE content_type_id = $1
                  AND url_title = $2
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(content_type_id)
        .bind(url_title)
        .bind(except_id)
        .fetch_one(pool)
        .await
        .context("failed to check url_title uniqueness")?;

        Ok(taken)
    }

    /// Stored dynamic field values keyed by field ID.
    pub async fn field_values(pool: &PgPool, entry_id: Uuid) -> Result<HashMap<Uuid, serde_json::Value>> {
        let rows: Vec<(Uuid, serde_json::Value)> =
            sqlx::query_as("SELECT field_id, data FROM entry_field_values WHERE entry_id = $1")
                .bind(entry_id)
                .fetch_all(pool)
                .await
                .context("failed to fetch entry field values")?;

        Ok(rows.into_iter().collect())
    }

    /// Insert or replace one dynamic field value.
    pub async fn save_field_value(
        conn: &mut PgConnection,
        entry_id: Uuid,
        field_id: Uuid,
        data: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entry_field_values (entry_id, field_id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (entry_id, field_id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(entry_id)
        .bind(field_id)
        .bind(data)
        .execute(&mut *conn)
        .await
        .context("failed to save entry field value")?;

        Ok(())
    }

    /// Delete an entry together with its field values and revisions.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let mut tx = pool.begin().await.context("failed to start transaction")?;

        // Revisions reference entries polymorphically, so no cascade applies.
        sqlx::query("DELETE FROM revisions WHERE resource_type = $1 AND resource_id = $2")
            .bind(ENTRY_RESOURCE_TYPE)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("failed to delete entry revisions")?;

        // Field values are deleted via CASCADE
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("failed to delete entry")?;

        tx.commit().await.context("failed to commit transaction")?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_defaults() {
        let type_id = Uuid::now_v7();
        let entry = Entry::new(type_id);
        assert_eq!(entry.content_type_id, type_id);
        assert_eq!(entry.entry_status_id, DEFAULT_ENTRY_STATUS_ID);
        assert!(entry.title.is_empty());
        assert!(entry.url_title.is_none());
    }

    #[test]
    fn apply_overwrites_scalars_and_keeps_unset_status() {
        let mut entry = Entry::new(Uuid::nil());
        entry.entry_status_id = 2;
        entry.meta_title = Some("old".to_string());
        let created = Utc::now() - chrono::Duration::days(3);

        entry.apply(EntryAttributes {
            title: "Hello".to_string(),
            url_title: Some("hello".to_string()),
            created_at: Some(created),
            ..Default::default()
        });

        assert_eq!(entry.title, "Hello");
        assert_eq!(entry.url_title.as_deref(), Some("hello"));
        assert_eq!(entry.entry_status_id, 2);
        assert_eq!(entry.meta_title, None);
        assert_eq!(entry.created_at, created);
    }
}
