// src/blob.rs

//! Opaque blob storage for uploaded images.
//!
//! Handlers only ever see a stored blob as its public URL. The store maps a URL
//! back to its key when the blob has to be deleted.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use sqlx::SqlitePool;
use url::Url;
use uuid::Uuid;

use crate::db::pending_blobs;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid blob reference: {0}")]
    InvalidReference(String),

    #[error("Blob storage unavailable: {0}")]
    Unavailable(String),

    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A blob that has been written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under a fresh key inside `folder`.
    async fn put(&self, folder: &str, extension: &str, bytes: Bytes)
    -> Result<StoredBlob, BlobError>;

    /// Deletes a blob by key. Deleting a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Resolves a public URL produced by `put` back to its key.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

/// Blob store backed by a local directory, served over HTTP under `public_base`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base: Url,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Result<Self, BlobError> {
        let mut base = public_base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let public_base =
            Url::parse(&base).map_err(|e| BlobError::InvalidReference(e.to_string()))?;

        Ok(Self {
            root: root.into(),
            public_base,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(BlobError::InvalidReference(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        folder: &str,
        extension: &str,
        bytes: Bytes,
    ) -> Result<StoredBlob, BlobError> {
        let key = format!("{}/{}.{}", folder, Uuid::new_v4().simple(), extension);
        let path = self.path_for_key(&key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        let url = self
            .public_base
            .join(&key)
            .map_err(|e| BlobError::InvalidReference(e.to_string()))?;

        tracing::debug!("Stored blob {} ({} bytes)", key, bytes.len());

        Ok(StoredBlob {
            key,
            url: url.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for_key(key)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let key = parsed.as_str().strip_prefix(self.public_base.as_str())?;

        self.path_for_key(key).ok().map(|_| key.to_string())
    }
}

/// Deletes the blob behind `url`, tolerating failure.
///
/// A failed delete is logged and the key is queued in `pending_blob_deletions`
/// for the reconciliation sweep. Returns whether the blob is gone.
pub async fn discard_blob(pool: &SqlitePool, blobs: &dyn BlobStore, url: &str) -> bool {
    let Some(key) = blobs.key_for_url(url) else {
        tracing::warn!("Cannot delete blob, unknown reference: {}", url);
        return false;
    };

    match blobs.delete(&key).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to delete blob {}: {}", key, e);
            if let Err(db_err) = pending_blobs::record(pool, &key, &e.to_string()).await {
                tracing::error!("Failed to queue blob {} for deletion: {}", key, db_err);
            }
            false
        }
    }
}
