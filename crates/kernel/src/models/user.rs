//! User model.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub mail: String,
    pub is_admin: bool,
    pub status: i16,
    /// IANA timezone identifier; `None` means the site timezone.
    pub timezone: Option<String>,
    pub created: DateTime<Utc>,
}

impl User {
    /// Check if this user is active.
    pub fn is_active(&self) -> bool {
        self.status == 1
    }

    /// Display name: "first last", or the login name when both are blank.
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.name.clone()
        } else {
            full.to_string()
        }
    }

    /// Resolve the user's timezone, falling back to `default` when unset or
    /// unrecognised.
    pub fn timezone_or(&self, default: Tz) -> Tz {
        match self.timezone.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(user_id = %self.id, timezone = %name, "unknown user timezone");
                default
            }),
            _ => default,
        }
    }

    /// Find a user by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, first_name, last_name, mail, is_admin, status, timezone, created FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by id")?;

        Ok(user)
    }

    /// Active users that may be picked as an entry author.
    pub async fn list_authors(pool: &PgPool) -> Result<Vec<Self>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, first_name, last_name, mail, is_admin, status, timezone, created FROM users WHERE status = 1 ORDER BY first_name, last_name, name",
        )
        .fetch_all(pool)
        .await
        .context("failed to list authors")?;

        Ok(users)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, timezone: Option<&str>) -> User {
        User {
            id: Uuid::nil(),
            name: "jdoe".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            mail: "jdoe@example.com".to_string(),
            is_admin: false,
            status: 1,
            timezone: timezone.map(str::to_string),
            created: Utc::now(),
        }
    }

    #[test]
    fn full_name_joins_first_and_last() {
        assert_eq!(user("Jane", "Doe", None).full_name(), "Jane Doe");
        assert_eq!(user("Jane", "", None).full_name(), "Jane");
        assert_eq!(user("", "Doe", None).full_name(), "Doe");
    }

    #[test]
    fn full_name_falls_back_to_login_name() {
        assert_eq!(user(" ", "", None).full_name(), "jdoe");
    }

    #[test]
    fn timezone_resolution() {
        assert_eq!(
            user("a", "b", Some("Europe/Rome")).timezone_or(Tz::UTC),
            Tz::Europe__Rome
        );
        assert_eq!(user("a", "b", None).timezone_or(Tz::UTC), Tz::UTC);
        assert_eq!(user("a", "b", Some("")).timezone_or(Tz::UTC), Tz::UTC);
        assert_eq!(
            user("a", "b", Some("Nowhere/Land")).timezone_or(Tz::Asia__Tokyo),
            Tz::Asia__Tokyo
        );
    }
}
