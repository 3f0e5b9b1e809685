// src/reconcile.rs

//! Consistency sweep for references the request path keeps in sync by hand.
//!
//! Comment creation and deletion write two records without a transaction, and
//! blob deletions are allowed to fail. This pass repairs what those partial
//! failures leave behind.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::{blob::BlobStore, db::pending_blobs, error::AppError};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Comment references pointing at a missing comment, or at a comment of another post.
    pub dangling_refs_removed: u64,
    /// Comments that were absent from their post's comment list.
    pub comments_relinked: u64,
    /// Queued blobs deleted during this pass.
    pub blobs_deleted: u64,
    /// Queued blobs whose deletion failed again.
    pub blobs_still_pending: u64,
}

pub async fn run(pool: &SqlitePool, blobs: &dyn BlobStore) -> Result<ReconcileReport, AppError> {
    let mut report = ReconcileReport::default();

    report.dangling_refs_removed = sqlx::query(
        "DELETE FROM post_comments WHERE NOT EXISTS ( \
             SELECT 1 FROM comments c \
             WHERE c.id = post_comments.comment_id AND c.post_id = post_comments.post_id)",
    )
    .execute(pool)
    .await?
    .rows_affected();

    report.comments_relinked = sqlx::query(
        "INSERT INTO post_comments (post_id, comment_id) \
         SELECT c.post_id, c.id FROM comments c \
         WHERE NOT EXISTS (SELECT 1 FROM post_comments pc WHERE pc.comment_id = c.id) \
         ORDER BY c.created_at, c.id",
    )
    .execute(pool)
    .await?
    .rows_affected();

    for pending in pending_blobs::list(pool).await? {
        match blobs.delete(&pending.blob_key).await {
            Ok(()) => {
                pending_blobs::remove(pool, pending.id).await?;
                report.blobs_deleted += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "Blob {} still cannot be deleted (queued since {}): {}",
                    pending.blob_key,
                    pending.created_at,
                    e
                );
                report.blobs_still_pending += 1;
            }
        }
    }

    tracing::info!(
        "Reconciliation done: {} dangling refs removed, {} comments relinked, {} blobs deleted, {} blobs pending",
        report.dangling_refs_removed,
        report.comments_relinked,
        report.blobs_deleted,
        report.blobs_still_pending
    );

    Ok(report)
}
