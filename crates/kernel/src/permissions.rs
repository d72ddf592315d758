//! Permission checking service with DashMap-based caching.
//!
//! Content types name the permission required to view, create, edit or
//! delete their entries. A user holds a permission through any of their
//! roles; admins hold every permission.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ContentType, Role, User};

/// Entry operations gated by a content type permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    View,
    Create,
    Edit,
    Delete,
}

impl EntryAction {
    /// The permission a content type requires for this action.
    pub fn required_permission(self, content_type: &ContentType) -> Option<Uuid> {
        match self {
            EntryAction::View => content_type.admin_entry_view_permission_id,
            EntryAction::Create => content_type.admin_entry_create_permission_id,
            EntryAction::Edit => content_type.admin_entry_edit_permission_id,
            EntryAction::Delete => content_type.admin_entry_delete_permission_id,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryAction::View => "view",
            EntryAction::Create => "create",
            EntryAction::Edit => "edit",
            EntryAction::Delete => "delete",
        }
    }
}

/// Whether a non-admin holding `held` satisfies `required`.
///
/// A content type without a configured permission is open to every user.
pub fn grants(held: &HashSet<Uuid>, required: Option<Uuid>) -> bool {
    required.is_none_or(|id| held.contains(&id))
}

/// Permission service with fast DashMap-based lookups.
#[derive(Clone)]
pub struct PermissionService {
    inner: Arc<PermissionServiceInner>,
}

struct PermissionServiceInner {
    /// Cache of user_id -> granted permission IDs.
    user_cache: DashMap<Uuid, Arc<HashSet<Uuid>>>,

    /// Database pool for cache misses.
    pool: PgPool,
}

impl PermissionService {
    /// Create a new permission service.
    pub fn new(pool: PgPool) -> Self {
        Self {
            inner: Arc::new(PermissionServiceInner {
                user_cache: DashMap::new(),
                pool,
            }),
        }
    }

    /// Permission IDs granted to a user through their roles.
    pub async fn permission_ids(&self, user: &User) -> Result<Arc<HashSet<Uuid>>> {
        if let Some(cached) = self.inner.user_cache.get(&user.id) {
            return Ok(Arc::clone(&cached));
        }

        let ids: HashSet<Uuid> = Role::permission_ids_for_user(&self.inner.pool, user.id)
            .await?
            .into_iter()
            .collect();
        let ids = Arc::new(ids);

        self.inner.user_cache.insert(user.id, Arc::clone(&ids));

        Ok(ids)
    }

    /// Check if a user has a specific permission.
    ///
    /// Admin users always return true.
    pub async fn user_has_permission(&self, user: &User, permission: Option<Uuid>) -> Result<bool> {
        if user.is_admin || permission.is_none() {
            return Ok(true);
        }

        let held = self.permission_ids(user).await?;
        Ok(grants(&held, permission))
    }

    /// Check whether a user may perform `action` on entries of a content type.
    pub async fn can(
        &self,
        user: &User,
        action: EntryAction,
        content_type: &ContentType,
    ) -> Result<bool> {
        self.user_has_permission(user, action.required_permission(content_type))
            .await
    }

    /// Invalidate the cache for a specific user.
    ///
    /// Call this when a user's roles change.
    pub fn invalidate_user(&self, user_id: Uuid) {
        self.inner.user_cache.remove(&user_id);
    }

    /// Invalidate the entire cache.
    ///
    /// Call this when role permissions change.
    pub fn invalidate_all(&self) {
        self.inner.user_cache.clear();
    }

    /// Get the number of cached entries (for monitoring).
    pub fn cache_size(&self) -> usize {
        self.inner.user_cache.len()
    }
}
