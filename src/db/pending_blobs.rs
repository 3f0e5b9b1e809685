//! Blob keys whose deletion failed and still have to be removed from the blob store.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, FromRow)]
pub struct PendingBlob {
    pub id: i64,
    pub blob_key: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Queues a key. Re-queuing an existing key only refreshes the reason.
pub async fn record(pool: &SqlitePool, key: &str, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO pending_blob_deletions (blob_key, reason, created_at) VALUES (?, ?, ?) \
         ON CONFLICT(blob_key) DO UPDATE SET reason = excluded.reason",
    )
    .bind(key)
    .bind(reason)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list(pool: &SqlitePool) -> Result<Vec<PendingBlob>, sqlx::Error> {
    sqlx::query_as::<_, PendingBlob>(
        "SELECT id, blob_key, reason, created_at FROM pending_blob_deletions ORDER BY id",
    )
    .fetch_all(pool)
    .await
}

pub async fn remove(pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM pending_blob_deletions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
