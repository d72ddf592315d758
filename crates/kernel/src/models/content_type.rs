//! Content type model.
//!
//! Content types describe which dynamic fields an entry carries, whether
//! entries get a routable `url_title`, and how many revisions are retained.
//! They are read-only from the entry workflow's point of view.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Content type record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentType {
    pub id: Uuid,
    pub title: String,
    pub short_name: String,

    /// Maximum number of entries of this type (`None` = unlimited).
    pub entries_allowed: Option<i32>,

    /// Revision cap; `0` or less disables revisions.
    pub max_revisions: i32,

    /// Entries carry a unique, URL-safe `url_title`.
    pub dynamic_routing_flag: bool,

    pub admin_entry_view_permission_id: Option<Uuid>,
    pub admin_entry_edit_permission_id: Option<Uuid>,
    pub admin_entry_create_permission_id: Option<Uuid>,
    pub admin_entry_delete_permission_id: Option<Uuid>,

    /// Field definitions, loaded separately from `content_type_fields`.
    #[sqlx(skip)]
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// A dynamic field attached to a content type.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FieldDefinition {
    pub id: Uuid,
    pub content_type_id: Uuid,

    /// Field-type identifier resolved through the field type registry.
    pub field_type: String,

    pub label: String,

    /// Form key of the field.
    pub short_tag: String,

    pub required: bool,

    /// Type-specific options (e.g. `max_length`, dropdown `options`).
    pub options: serde_json::Value,

    pub sort: i32,
}

const CONTENT_TYPE_COLUMNS: &str = "id, title, short_name, entries_allowed, max_revisions, dynamic_routing_flag, admin_entry_view_permission_id, admin_entry_edit_permission_id, admin_entry_create_permission_id, admin_entry_delete_permission_id";

impl ContentType {
    /// Whether saving an entry of this type records a revision.
    pub fn keeps_revisions(&self) -> bool {
        self.max_revisions > 0
    }

    /// Whether another entry may be created given the current entry count.
    pub fn allows_another_entry(&self, current_count: i64) -> bool {
        match self.entries_allowed {
            Some(limit) => current_count < i64::from(limit),
            None => true,
        }
    }

    /// Find a content type (with its fields) by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let content_type = sqlx::query_as::<_, ContentType>(&format!(
            "SELECT {CONTENT_TYPE_COLUMNS} FROM content_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch content type")?;

        let Some(mut content_type) = content_type else {
            return Ok(None);
        };

        content_type.fields = FieldDefinition::list_for_type(pool, id).await?;
        Ok(Some(content_type))
    }

    /// List all content types ordered by title (fields not loaded).
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let types = sqlx::query_as::<_, ContentType>(&format!(
            "SELECT {CONTENT_TYPE_COLUMNS} FROM content_types ORDER BY title"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list content types")?;

        Ok(types)
    }

    /// Number of entries of this type.
    pub async fn entry_count(&self, pool: &PgPool) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE content_type_id = $1")
                .bind(self.id)
                .fetch_one(pool)
                .await
                .context("failed to count entries")?;

        Ok(count)
    }
}

impl FieldDefinition {
    /// Fields of a content type in display order.
    pub async fn list_for_type(pool: &PgPool, content_type_id: Uuid) -> Result<Vec<Self>> {
        let fields = sqlx::query_as::<_, FieldDefinition>(
            "SELECT id, content_type_id, field_type, label, short_tag, required, options, sort FROM content_type_fields WHERE content_type_id = $1 ORDER BY sort, label",
        )
        .bind(content_type_id)
        .fetch_all(pool)
        .await
        .context("failed to list content type fields")?;

        Ok(fields)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn content_type(entries_allowed: Option<i32>, max_revisions: i32) -> ContentType {
        ContentType {
            id: Uuid::nil(),
            title: "Page".to_string(),
            short_name: "page".to_string(),
            entries_allowed,
            max_revisions,
            dynamic_routing_flag: false,
            admin_entry_view_permission_id: None,
            admin_entry_edit_permission_id: None,
            admin_entry_create_permission_id: None,
            admin_entry_delete_permission_id: None,
            fields: vec![],
        }
    }

    #[test]
    fn revisions_require_positive_cap() {
        assert!(content_type(None, 3).keeps_revisions());
        assert!(!content_type(None, 0).keeps_revisions());
        assert!(!content_type(None, -1).keeps_revisions());
    }

    #[test]
    fn entry_limit() {
        assert!(content_type(None, 0).allows_another_entry(10_000));
        assert!(content_type(Some(1), 0).allows_another_entry(0));
        assert!(!content_type(Some(1), 0).allows_another_entry(1));
        assert!(!content_type(Some(0), 0).allows_another_entry(0));
    }
}
