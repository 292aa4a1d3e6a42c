use async_trait::async_trait;
use bytes::Bytes;
use casedesk_contract::{
    CaseRequest, GeoPoint, RecordId, UploadedFile, VoiceNoteRef, WizardSnapshot,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub storage_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("backend unavailable")]
    Unavailable,
    #[error("creation failed: {0}")]
    CreationFailed(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Persists case records. Implemented by the hosted document store in production.
#[async_trait]
pub trait RecordService: Send + Sync {
    async fn create_record(
        &self,
        request: CaseRequest,
        voice_note: Option<VoiceNoteRef>,
    ) -> Result<RecordId, BridgeError>;

    async fn attach_documents(
        &self,
        record_id: &str,
        documents: &[UploadedFile],
    ) -> Result<(), BridgeError>;
}

/// Durable blob storage. A write either fully succeeds or fails.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(
        &self,
        data: Bytes,
        content_type: &str,
        path: &str,
    ) -> Result<StoredObject, BridgeError>;

    async fn delete(&self, path: &str) -> Result<(), BridgeError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Identity, BridgeError>;
}

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn locate(&self) -> Result<GeoPoint, BridgeError>;
}

/// Save points for in-progress wizards, one per reporter.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_draft(
        &self,
        reporter_id: &str,
        snapshot: &WizardSnapshot,
    ) -> Result<(), BridgeError>;

    async fn load_draft(&self, reporter_id: &str) -> Result<Option<WizardSnapshot>, BridgeError>;

    /// Returns whether a saved draft existed.
    async fn discard_draft(&self, reporter_id: &str) -> Result<bool, BridgeError>;
}
