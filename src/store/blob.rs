//! Attachment storage on the local filesystem.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::BlobError;
use crate::store::BlobStore;

/// Stores blobs as plain files below `root` and hands out `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: &Path) -> Self {
        LocalBlobStore { root: root.to_path_buf() }
    }

    /// Resolve `key` below the root, refusing anything that would escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        let rel = Path::new(key);
        let clean = !key.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

/// Storage key for a task attachment: `tasks/{uid}/{filename}_{timestamp}`.
pub fn attachment_key(uid: &str, file_name: &str, timestamp_ms: i64) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("tasks/{uid}/{name}_{timestamp_ms}")
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, key: &str, data: &[u8]) -> Result<String, BlobError> {
        let path = self.resolve(key)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, data).await?;
        let abs = tokio::fs::canonicalize(&path).await?;
        tracing::info!(key, bytes = data.len(), "attachment uploaded");
        Ok(format!("file://{}", abs.display()))
    }
}
