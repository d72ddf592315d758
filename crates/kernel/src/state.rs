//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use redis::Client as RedisClient;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::content::{ContentTypeRegistry, EntryService, FieldTypeRegistry};
use crate::db;
use crate::permissions::PermissionService;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Redis client, used for health checks (sessions hold their own pool).
    redis: RedisClient,

    /// Permission service for access control.
    permissions: PermissionService,

    /// Content type registry.
    content_types: ContentTypeRegistry,

    /// Field handler factories keyed by field type.
    field_types: Arc<FieldTypeRegistry>,

    /// Entry workflows.
    entries: EntryService,

    /// Site timezone.
    app_timezone: Tz,

    /// Page size of the entry listing.
    entries_per_page: u64,
}

impl AppState {
    /// Create new application state with database connections.
    pub async fn new(config: &Config) -> Result<Self> {
        // Create PostgreSQL pool
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        // Run migrations
        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        // Create Redis client
        let redis = RedisClient::open(config.redis_url.as_str())
            .context("failed to create Redis client")?;

        // Test Redis connection
        let mut conn = redis
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to Redis")?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;

        let permissions = PermissionService::new(db.clone());
        let content_types = ContentTypeRegistry::new(db.clone());
        let field_types = Arc::new(FieldTypeRegistry::with_builtins());

        info!(
            field_types = ?field_types.field_types(),
            timezone = %config.app_timezone,
            "entry services configured"
        );

        let entries = EntryService::new(
            db.clone(),
            content_types.clone(),
            Arc::clone(&field_types),
            permissions.clone(),
            config.app_timezone,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                db,
                redis,
                permissions,
                content_types,
                field_types,
                entries,
                app_timezone: config.app_timezone,
                entries_per_page: config.entries_per_page,
            }),
        })
    }

    /// Get the database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// Get the Redis client.
    pub fn redis(&self) -> &RedisClient {
        &self.inner.redis
    }

    /// Get the permission service.
    pub fn permissions(&self) -> &PermissionService {
        &self.inner.permissions
    }

    /// Get the content type registry.
    pub fn content_types(&self) -> &ContentTypeRegistry {
        &self.inner.content_types
    }

    /// Get the field type registry.
    pub fn field_types(&self) -> &Arc<FieldTypeRegistry> {
        &self.inner.field_types
    }

    /// Get the entry service.
    pub fn entries(&self) -> &EntryService {
        &self.inner.entries
    }

    pub fn app_timezone(&self) -> Tz {
        self.inner.app_timezone
    }

    pub fn entries_per_page(&self) -> u64 {
        self.inner.entries_per_page
    }

    /// Check if PostgreSQL is healthy.
    pub async fn postgres_healthy(&self) -> bool {
        db::check_health(&self.inner.db).await
    }

    /// Check if Redis is healthy.
    pub async fn redis_healthy(&self) -> bool {
        let Ok(mut conn) = self.inner.redis.get_multiplexed_async_connection().await else {
            return false;
        };

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}
