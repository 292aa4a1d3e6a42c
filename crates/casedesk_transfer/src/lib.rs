pub mod path;
pub mod retry;
pub mod sequencer;

use casedesk_contract::{FileHandle, UploadCategory, UploadedFile};
use serde::{Deserialize, Serialize};

pub use path::{sanitize_segment, storage_path};
pub use retry::RetryPolicy;
pub use sequencer::{BatchOutcome, SequencerConfig, UploadError, UploadSequencer};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    Running,
    Success,
    Failed,
}

/// One transfer of one file. Frozen once it reports success.
#[derive(Debug, Clone)]
pub struct UploadTask {
    file: FileHandle,
    category: UploadCategory,
    status: UploadStatus,
    attempts: u32,
    result: Option<UploadedFile>,
    failure_reason: Option<String>,
}

impl UploadTask {
    pub fn new(file: FileHandle, category: UploadCategory) -> Self {
        Self {
            file,
            category,
            status: UploadStatus::Queued,
            attempts: 0,
            result: None,
            failure_reason: None,
        }
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn category(&self) -> UploadCategory {
        self.category
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn result(&self) -> Option<&UploadedFile> {
        self.result.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub(crate) fn begin_attempt(&mut self) {
        if self.status != UploadStatus::Success {
            self.status = UploadStatus::Running;
            self.attempts += 1;
        }
    }

    pub(crate) fn succeed(&mut self, uploaded: UploadedFile) {
        if self.status != UploadStatus::Success {
            self.status = UploadStatus::Success;
            self.result = Some(uploaded);
            self.failure_reason = None;
        }
    }

    pub(crate) fn fail(&mut self, reason: String) {
        if self.status != UploadStatus::Success {
            self.status = UploadStatus::Failed;
            self.failure_reason = Some(reason);
        }
    }

    pub(crate) fn into_dead_letter(self) -> Option<DeadLetter> {
        match self.status {
            UploadStatus::Success => None,
            _ => Some(DeadLetter {
                reason: self
                    .failure_reason
                    .unwrap_or_else(|| "upload never attempted".to_string()),
                attempts: self.attempts,
                category: self.category,
                file: self.file,
            }),
        }
    }
}

/// A file that could not be uploaded, kept so the user can re-attempt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub file: FileHandle,
    pub category: UploadCategory,
    pub reason: String,
    pub attempts: u32,
}

impl DeadLetter {
    pub fn file_name(&self) -> &str {
        &self.file.file_name
    }
}
