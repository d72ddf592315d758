//! Role and permission lookups.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// Role queries.
pub struct Role;

impl Role {
    /// IDs of the roles assigned to a user.
    pub async fn ids_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT role_id FROM user_roles WHERE user_id = $1 ORDER BY role_id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch user roles")?;

        Ok(ids)
    }

    /// IDs of every permission granted to a user through their roles.
    pub async fn permission_ids_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT rp.permission_id
            FROM role_permissions rp
            INNER JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("failed to fetch user permissions")?;

        Ok(ids)
    }
}
