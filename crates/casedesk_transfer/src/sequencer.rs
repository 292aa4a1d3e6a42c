use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use casedesk_bridge::{BlobStore, BridgeError};
use casedesk_contract::{FileHandle, FileSource, UploadCategory, UploadedFile};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::path::storage_path;
use crate::retry::RetryPolicy;
use crate::{DeadLetter, UploadTask};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload failed: {0}")]
    Store(#[from] BridgeError),
    #[error("failed to read {file_name}: {source}")]
    Source {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, Default)]
pub struct SequencerConfig {
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub uploaded: Vec<UploadedFile>,
    pub dropped: Vec<DeadLetter>,
    /// Source file and attempt count behind each entry of `uploaded`, same order.
    pub sources: Vec<(FileHandle, u32)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }

    /// Demotes every uploaded file to a dead letter. Returns the stored objects
    /// so the caller can remove them.
    pub fn unlink(&mut self, reason: &str) -> Vec<UploadedFile> {
        for (uploaded, (file, attempts)) in self.uploaded.iter().zip(self.sources.drain(..)) {
            self.dropped.push(DeadLetter {
                file,
                category: uploaded.category,
                reason: reason.to_string(),
                attempts,
            });
        }
        std::mem::take(&mut self.uploaded)
    }
}

/// Pushes attachments to blob storage. Independent files upload concurrently and
/// one failure never cancels its siblings.
pub struct UploadSequencer {
    store: Arc<dyn BlobStore>,
    retry: RetryPolicy,
    sequence: AtomicU64,
}

impl UploadSequencer {
    pub fn new(store: Arc<dyn BlobStore>, config: SequencerConfig) -> Self {
        Self {
            store,
            retry: config.retry,
            sequence: AtomicU64::new(0),
        }
    }

    pub async fn upload(
        &self,
        file: &FileHandle,
        owner_id: &str,
        category: UploadCategory,
    ) -> Result<UploadedFile, UploadError> {
        let mut task = UploadTask::new(file.clone(), category);
        self.execute(&mut task, owner_id, Utc::now()).await
    }

    pub async fn upload_batch(
        &self,
        files: &[FileHandle],
        owner_id: &str,
        category: UploadCategory,
    ) -> BatchOutcome {
        let submitted_at = Utc::now();
        let tasks = join_all(files.iter().map(|file| async move {
            let mut task = UploadTask::new(file.clone(), category);
            // the outcome is recorded on the task itself
            let _ = self.execute(&mut task, owner_id, submitted_at).await;
            task
        }))
        .await;

        let mut outcome = BatchOutcome::default();
        for task in tasks {
            let uploaded = task.result().cloned();
            if let Some(uploaded) = uploaded {
                outcome.uploaded.push(uploaded);
                outcome.sources.push((task.file().clone(), task.attempts()));
            } else if let Some(dead) = task.into_dead_letter() {
                warn!(
                    file_name = %dead.file_name(),
                    category = %dead.category,
                    attempts = dead.attempts,
                    reason = %dead.reason,
                    "attachment dropped"
                );
                outcome.dropped.push(dead);
            }
        }

        info!(
            owner_id = %owner_id,
            category = %category,
            uploaded = outcome.uploaded.len(),
            dropped = outcome.dropped.len(),
            "upload batch finished"
        );
        outcome
    }

    async fn execute(
        &self,
        task: &mut UploadTask,
        owner_id: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<UploadedFile, UploadError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let path = match storage_path(
            task.category(),
            owner_id,
            submitted_at,
            sequence,
            &task.file().file_name,
        ) {
            Ok(path) => path,
            Err(error) => {
                task.fail(error.to_string());
                return Err(error);
            }
        };

        let data = match load_source(task.file()).await {
            Ok(data) => data,
            Err(error) => {
                task.begin_attempt();
                task.fail(error.to_string());
                return Err(error);
            }
        };

        let max_attempts = self.retry.max_attempts();
        let mut last_error = BridgeError::Unavailable;
        for attempt in 1..=max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            task.begin_attempt();
            match self
                .store
                .store(data.clone(), &task.file().content_type, &path)
                .await
            {
                Ok(stored) => {
                    let uploaded = UploadedFile {
                        name: task.file().file_name.clone(),
                        url: stored.url,
                        content_type: task.file().content_type.clone(),
                        size: data.len() as u64,
                        storage_path: stored.storage_path,
                        category: task.category(),
                    };
                    debug!(path = %uploaded.storage_path, attempt, "upload stored");
                    task.succeed(uploaded.clone());
                    return Ok(uploaded);
                }
                Err(error) => {
                    debug!(path = %path, attempt, max_attempts, error = %error, "upload attempt failed");
                    last_error = error;
                }
            }
        }

        task.fail(last_error.to_string());
        Err(UploadError::Store(last_error))
    }
}

async fn load_source(file: &FileHandle) -> Result<Bytes, UploadError> {
    match &file.source {
        FileSource::Memory(data) => Ok(data.clone()),
        FileSource::Path(path) => tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|source| UploadError::Source {
                file_name: file.file_name.clone(),
                source,
            }),
    }
}
