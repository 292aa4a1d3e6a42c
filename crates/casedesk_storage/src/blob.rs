use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use casedesk_bridge::{BlobStore, BridgeError, StoredObject};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Blob store backed by a directory on local disk.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub async fn new(base_path: impl Into<PathBuf>, base_url: impl Into<String>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)
            .await
            .with_context(|| format!("failed to create blob directory {}", base_path.display()))?;

        Ok(Self {
            base_path,
            base_url: base_url.into(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, key: &str) -> Result<PathBuf, BridgeError> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(BridgeError::UploadFailed(format!(
                "storage key {key:?} escapes the blob directory"
            )));
        }
        Ok(self.base_path.join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(
        &self,
        data: Bytes,
        content_type: &str,
        path: &str,
    ) -> Result<StoredObject, BridgeError> {
        let target = self.key_to_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|error| {
                BridgeError::UploadFailed(format!("create {}: {error}", parent.display()))
            })?;
        }

        let mut file = fs::File::create(&target).await.map_err(|error| {
            BridgeError::UploadFailed(format!("create {}: {error}", target.display()))
        })?;
        file.write_all(&data).await.map_err(|error| {
            BridgeError::UploadFailed(format!("write {}: {error}", target.display()))
        })?;
        file.sync_all().await.map_err(|error| {
            BridgeError::UploadFailed(format!("sync {}: {error}", target.display()))
        })?;

        info!(
            key = %path,
            content_type = %content_type,
            size_bytes = data.len(),
            "blob stored on disk"
        );
        Ok(StoredObject {
            url: self.url_for(path),
            storage_path: path.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), BridgeError> {
        let target = self.key_to_path(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(BridgeError::NotFound(path.to_string()))
            }
            Err(error) => Err(BridgeError::Storage(format!(
                "remove {}: {error}",
                target.display()
            ))),
        }
    }
}
