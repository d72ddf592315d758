//! Canvas test utilities.
//!
//! Database fixtures for integration tests: users, roles, permissions and
//! content types with their fields. Every fixture gets a unique name so
//! tests can share one database.

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Short random suffix for unique names.
pub fn unique_suffix() -> String {
    Uuid::now_v7().simple().to_string()[24..].to_string()
}

/// A test user builder.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub is_admin: bool,
    pub status: i16,
    pub timezone: Option<String>,
}

/// Create an active, non-admin test user.
pub fn test_user(first_name: &str, last_name: &str) -> TestUser {
    TestUser {
        id: Uuid::now_v7(),
        name: format!("user_{}", unique_suffix()),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        is_admin: false,
        status: 1,
        timezone: None,
    }
}

impl TestUser {
    /// Make the user an administrator.
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Block the user.
    pub fn blocked(mut self) -> Self {
        self.status = 0;
        self
    }

    /// Set the user's timezone.
    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = Some(timezone.to_string());
        self
    }

    /// Insert the user.
    pub async fn insert(&self, pool: &PgPool) -> Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, first_name, last_name, mail, is_admin, status, timezone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(format!("{}@example.com", self.name))
        .bind(self.is_admin)
        .bind(self.status)
        .bind(&self.timezone)
        .execute(pool)
        .await
        .context("failed to insert test user")?;

        Ok(self.id)
    }
}

/// Delete a user.
pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete test user")?;
    Ok(())
}

/// Create a permission and return its id.
pub async fn create_permission(pool: &PgPool, label: &str) -> Result<Uuid> {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO permissions (id, key_name, name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("{label}_{}", unique_suffix()))
        .bind(label)
        .execute(pool)
        .await
        .context("failed to insert test permission")?;
    Ok(id)
}

/// Create a role holding `permissions` and assign it to `user_id`.
pub async fn grant(pool: &PgPool, user_id: Uuid, permissions: &[Uuid]) -> Result<Uuid> {
    let role_id = Uuid::now_v7();
    sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2)")
        .bind(role_id)
        .bind(format!("role_{}", unique_suffix()))
        .execute(pool)
        .await
        .context("failed to insert test role")?;

    for permission_id in permissions {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2)")
            .bind(role_id)
            .bind(permission_id)
            .execute(pool)
            .await
            .context("failed to grant test permission")?;
    }

    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await
        .context("failed to assign test role")?;

    Ok(role_id)
}

/// A test field definition.
#[derive(Debug, Clone)]
pub struct TestField {
    pub field_type: String,
    pub label: String,
    pub short_tag: String,
    pub required: bool,
    pub options: JsonValue,
}

/// Create an optional field.
pub fn test_field(field_type: &str, short_tag: &str, label: &str) -> TestField {
    TestField {
        field_type: field_type.to_string(),
        label: label.to_string(),
        short_tag: short_tag.to_string(),
        required: false,
        options: serde_json::json!({}),
    }
}

impl TestField {
    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set type-specific options.
    pub fn with_options(mut self, options: JsonValue) -> Self {
        self.options = options;
        self
    }
}

/// A test content type builder.
#[derive(Debug, Clone)]
pub struct TestContentType {
    pub id: Uuid,
    pub title: String,
    pub short_name: String,
    pub entries_allowed: Option<i32>,
    pub max_revisions: i32,
    pub dynamic_routing: bool,
    pub view_permission: Option<Uuid>,
    pub edit_permission: Option<Uuid>,
    pub create_permission: Option<Uuid>,
    pub delete_permission: Option<Uuid>,
    pub fields: Vec<TestField>,
}

/// Create a content type open to every user, keeping 5 revisions.
pub fn test_content_type(title: &str) -> TestContentType {
    TestContentType {
        id: Uuid::now_v7(),
        title: title.to_string(),
        short_name: format!("type_{}", unique_suffix()),
        entries_allowed: None,
        max_revisions: 5,
        dynamic_routing: false,
        view_permission: None,
        edit_permission: None,
        create_permission: None,
        delete_permission: None,
        fields: Vec::new(),
    }
}

impl TestContentType {
    pub fn with_max_revisions(mut self, max: i32) -> Self {
        self.max_revisions = max;
        self
    }

    pub fn with_entries_allowed(mut self, allowed: i32) -> Self {
        self.entries_allowed = Some(allowed);
        self
    }

    /// Give entries a unique `url_title`.
    pub fn dynamic_routing(mut self) -> Self {
        self.dynamic_routing = true;
        self
    }

    /// Guard every action with `permission`.
    pub fn with_permission(mut self, permission: Uuid) -> Self {
        self.view_permission = Some(permission);
        self.edit_permission = Some(permission);
        self.create_permission = Some(permission);
        self.delete_permission = Some(permission);
        self
    }

    /// Guard only deletion with `permission`.
    pub fn with_delete_permission(mut self, permission: Uuid) -> Self {
        self.delete_permission = Some(permission);
        self
    }

    pub fn with_field(mut self, field: TestField) -> Self {
        self.fields.push(field);
        self
    }

    /// Insert the content type and its fields.
    pub async fn insert(&self, pool: &PgPool) -> Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO content_types (
                id, title, short_name, entries_allowed, max_revisions, dynamic_routing_flag,
                admin_entry_view_permission_id, admin_entry_edit_permission_id,
                admin_entry_create_permission_id, admin_entry_delete_permission_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.short_name)
        .bind(self.entries_allowed)
        .bind(self.max_revisions)
        .bind(self.dynamic_routing)
        .bind(self.view_permission)
        .bind(self.edit_permission)
        .bind(self.create_permission)
        .bind(self.delete_permission)
        .execute(pool)
        .await
        .context("failed to insert test content type")?;

        for (sort, field) in self.fields.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO content_type_fields
                    (id, content_type_id, field_type, label, short_tag, required, options, sort)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(self.id)
            .bind(&field.field_type)
            .bind(&field.label)
            .bind(&field.short_tag)
            .bind(field.required)
            .bind(&field.options)
            .bind(sort as i32)
            .execute(pool)
            .await
            .context("failed to insert test field")?;
        }

        Ok(self.id)
    }
}

/// Number of revisions stored for an entry.
pub async fn count_revisions(pool: &PgPool, entry_id: Uuid) -> Result<i64> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM revisions WHERE resource_type = 'entry' AND resource_id = $1",
    )
    .bind(entry_id)
    .fetch_one(pool)
    .await
    .context("failed to count revisions")?;
    Ok(count.0)
}

/// Revision payload titles for an entry, newest first.
pub async fn revision_titles(pool: &PgPool, entry_id: Uuid) -> Result<Vec<String>> {
    let rows: Vec<(Option<String>,)> = sqlx::query_as(
        r#"
        SELECT data->>'title' FROM revisions
        WHERE resource_type = 'entry' AND resource_id = $1
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(entry_id)
    .fetch_all(pool)
    .await
    .context("failed to load revision titles")?;
    Ok(rows.into_iter().filter_map(|(title,)| title).collect())
}

/// Remove a content type; entries, fields and revisions cascade.
pub async fn delete_content_type(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM content_types WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete test content type")?;
    Ok(())
}
