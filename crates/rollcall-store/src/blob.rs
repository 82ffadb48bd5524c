//! Filesystem blob store for uploaded face images.
//!
//! Keys are relative, namespaced paths (`user-faces/<uuid>.jpg`) so a row's
//! `image_path` stays meaningful if the root directory moves.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rollcall_core::error::BlobError;
use rollcall_core::service::BlobStore;
use uuid::Uuid;

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a blob key onto the root directory, rejecting anything that
    /// could escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        let candidate = Path::new(key);
        let escapes = candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || key.contains('\\') {
            return Err(BlobError::Io(format!("invalid blob key: {key}")));
        }
        Ok(self.root.join(candidate))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8], namespace: &str, extension: &str) -> Result<String, BlobError> {
        let key = format!("{namespace}/{}.{extension}", Uuid::new_v4());
        let target = self.resolve(&key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Io(e.to_string()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| BlobError::Io(e.to_string()))?;
        tracing::debug!(key = %key, bytes = bytes.len(), "blob stored");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let target = self.resolve(key)?;
        tokio::fs::read(&target).await.map_err(|e| map_io(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let target = self.resolve(key)?;
        Ok(tokio::fs::metadata(&target).await.is_ok())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let target = self.resolve(key)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| map_io(key, e))
    }

    async fn size(&self, key: &str) -> Result<u64, BlobError> {
        let target = self.resolve(key)?;
        let meta = tokio::fs::metadata(&target)
            .await
            .map_err(|e| map_io(key, e))?;
        Ok(meta.len())
    }

    fn backend(&self) -> &str {
        "local"
    }
}

fn map_io(key: &str, err: std::io::Error) -> BlobError {
    if err.kind() == std::io::ErrorKind::NotFound {
        BlobError::NotFound(key.to_string())
    } else {
        BlobError::Io(err.to_string())
    }
}
