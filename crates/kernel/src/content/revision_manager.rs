//! Revision retention.
//!
//! After every save of an entry whose content type keeps revisions, the
//! oldest revisions beyond the cap are pruned and a snapshot of the
//! submitted data is recorded. Pruning deletes at most
//! [`PRUNE_BATCH_SIZE`] rows per save, so a large backlog of excess
//! revisions shrinks over several saves.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::revision::ENTRY_RESOURCE_TYPE;
use crate::models::{ContentType, Entry, NewRevision, Revision, User};

/// Upper bound of revisions deleted by one save.
pub const PRUNE_BATCH_SIZE: i64 = 25;

/// Storage operations needed by the revision manager.
#[async_trait]
pub trait RevisionStore: Send {
    /// IDs of an entry's revisions, newest first, skipping `offset` and
    /// returning at most `limit`.
    async fn revision_ids_newest_first(
        &mut self,
        entry_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>>;

    async fn delete_revisions(&mut self, ids: &[Uuid]) -> Result<u64>;

    async fn insert_revision(&mut self, revision: NewRevision) -> Result<Revision>;
}

#[async_trait]
impl RevisionStore for PgConnection {
    async fn revision_ids_newest_first(
        &mut self,
        entry_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        Revision::ids_for_entry(self, entry_id, offset, limit).await
    }

    async fn delete_revisions(&mut self, ids: &[Uuid]) -> Result<u64> {
        Revision::delete_many(self, ids).await
    }

    async fn insert_revision(&mut self, revision: NewRevision) -> Result<Revision> {
        Revision::create(self, revision).await
    }
}

/// The `(offset, limit)` window of revisions to prune before a new one is
/// added, or `None` when the content type keeps no revisions.
///
/// Keeping the newest `max_revisions - 1` leaves room for the new snapshot.
pub fn prune_window(content_type: &ContentType) -> Option<(i64, i64)> {
    if !content_type.keeps_revisions() {
        return None;
    }
    Some((i64::from(content_type.max_revisions) - 1, PRUNE_BATCH_SIZE))
}

/// Prune excess revisions of `entry` and record a snapshot of `data`.
///
/// Returns `None` without touching storage when the content type keeps no
/// revisions.
pub async fn record<S>(
    store: &mut S,
    content_type: &ContentType,
    entry: &Entry,
    author: &User,
    data: serde_json::Value,
) -> Result<Option<Revision>>
where
    S: RevisionStore + ?Sized,
{
    let Some((offset, limit)) = prune_window(content_type) else {
        return Ok(None);
    };

    let stale = store
        .revision_ids_newest_first(entry.id, offset, limit)
        .await?;
    if !stale.is_empty() {
        let deleted = store.delete_revisions(&stale).await?;
        debug!(entry_id = %entry.id, deleted, "pruned old revisions");
    }

    let revision = store
        .insert_revision(NewRevision {
            resource_type: ENTRY_RESOURCE_TYPE.to_string(),
            resource_id: entry.id,
            content_type_id: content_type.id,
            author_id: author.id,
            author_name: author.full_name(),
            data,
        })
        .await?;

    info!(
        entry_id = %entry.id,
        revision_id = %revision.id,
        "revision recorded"
    );

    Ok(Some(revision))
}
