//! Content type registry.
//!
//! Caches content type definitions (with their fields) loaded from the
//! database. Content types are edited outside the entry workflow, so the
//! cache is only cleared through [`ContentTypeRegistry::invalidate`].

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::ContentType;

/// Registry of content types.
#[derive(Clone)]
pub struct ContentTypeRegistry {
    inner: Arc<ContentTypeRegistryInner>,
}

struct ContentTypeRegistryInner {
    pool: PgPool,
    types: DashMap<Uuid, ContentType>,
}

impl ContentTypeRegistry {
    /// Create a new content type registry.
    pub fn new(pool: PgPool) -> Self {
        Self {
            inner: Arc::new(ContentTypeRegistryInner {
                pool,
                types: DashMap::new(),
            }),
        }
    }

    /// Get a content type with its fields, loading it on a cache miss.
    pub async fn get(&self, id: Uuid) -> Result<Option<ContentType>> {
        if let Some(content_type) = self.inner.types.get(&id) {
            return Ok(Some(content_type.clone()));
        }

        let content_type = ContentType::find_by_id(&self.inner.pool, id).await?;

        if let Some(ref ct) = content_type {
            debug!(content_type_id = %id, fields = ct.fields.len(), "content type cached");
            self.inner.types.insert(id, ct.clone());
        }

        Ok(content_type)
    }

    /// List all content types ordered by title (fields not loaded).
    pub async fn list(&self) -> Result<Vec<ContentType>> {
        ContentType::list(&self.inner.pool).await
    }

    /// Invalidate a cached content type.
    pub fn invalidate(&self, id: Uuid) {
        self.inner.types.remove(&id);
    }

    /// Clear all cached content types.
    pub fn clear(&self) {
        self.inner.types.clear();
    }

    /// Number of cached content types.
    pub fn len(&self) -> usize {
        self.inner.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.types.is_empty()
    }
}
