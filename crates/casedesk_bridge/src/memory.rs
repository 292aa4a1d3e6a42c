use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use casedesk_contract::{
    decode_snapshot, encode_snapshot, CaseRequest, GeoPoint, RecordId, UploadedFile, VoiceNoteRef,
    WizardSnapshot,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bridge::{
    BlobStore, BridgeError, DraftStore, GeolocationProvider, Identity, IdentityProvider,
    RecordService, StoredObject,
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredCase {
    pub record_id: RecordId,
    pub request: CaseRequest,
    pub voice_note: Option<VoiceNoteRef>,
    pub documents: Vec<UploadedFile>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryRecordService {
    records: RwLock<Vec<StoredCase>>,
    reject_creation: AtomicBool,
    reject_attach: AtomicBool,
}

impl InMemoryRecordService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reject_creation(&self, reject: bool) {
        self.reject_creation.store(reject, Ordering::SeqCst);
    }

    pub fn set_reject_attach(&self, reject: bool) {
        self.reject_attach.store(reject, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<StoredCase> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, record_id: &str) -> Option<StoredCase> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.record_id == record_id)
            .cloned()
    }
}

#[async_trait]
impl RecordService for InMemoryRecordService {
    async fn create_record(
        &self,
        request: CaseRequest,
        voice_note: Option<VoiceNoteRef>,
    ) -> Result<RecordId, BridgeError> {
        if self.reject_creation.load(Ordering::SeqCst) {
            return Err(BridgeError::CreationFailed(
                "record store rejected the write".to_string(),
            ));
        }

        let record_id = Uuid::now_v7().to_string();
        info!(
            record_id = %record_id,
            kind = ?request.kind(),
            has_voice_note = voice_note.is_some(),
            "case record created"
        );
        self.records.write().await.push(StoredCase {
            record_id: record_id.clone(),
            request,
            voice_note,
            documents: Vec::new(),
            created_at: Utc::now(),
        });
        Ok(record_id)
    }

    async fn attach_documents(
        &self,
        record_id: &str,
        documents: &[UploadedFile],
    ) -> Result<(), BridgeError> {
        if self.reject_attach.load(Ordering::SeqCst) {
            return Err(BridgeError::Unavailable);
        }

        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| record.record_id == record_id)
            .ok_or_else(|| BridgeError::NotFound(record_id.to_string()))?;
        record.documents.extend_from_slice(documents);
        Ok(())
    }
}

/// Blob store kept in a map, with switches to simulate a flaky or hostile backend.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    base_url: String,
    objects: RwLock<BTreeMap<String, (Bytes, String)>>,
    rejected_names: RwLock<Vec<String>>,
    fail_next: AtomicUsize,
    writes_attempted: AtomicUsize,
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl InMemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(BTreeMap::new()),
            rejected_names: RwLock::new(Vec::new()),
            fail_next: AtomicUsize::new(0),
            writes_attempted: AtomicUsize::new(0),
        }
    }

    /// Every write whose path ends with `file_name` is rejected.
    pub async fn reject_file_named(&self, file_name: impl Into<String>) {
        self.rejected_names.write().await.push(file_name.into());
    }

    /// Rejects the next `count` writes regardless of path.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn writes_attempted(&self) -> usize {
        self.writes_attempted.load(Ordering::SeqCst)
    }

    pub async fn paths(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, path: &str) -> Option<(Bytes, String)> {
        self.objects.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store(
        &self,
        data: Bytes,
        content_type: &str,
        path: &str,
    ) -> Result<StoredObject, BridgeError> {
        self.writes_attempted.fetch_add(1, Ordering::SeqCst);

        let forced = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if forced {
            return Err(BridgeError::UploadFailed(format!("transient failure writing {path}")));
        }
        if self
            .rejected_names
            .read()
            .await
            .iter()
            .any(|name| path.ends_with(name.as_str()))
        {
            warn!(path = %path, "blob write rejected");
            return Err(BridgeError::UploadFailed(format!("write rejected for {path}")));
        }

        self.objects
            .write()
            .await
            .insert(path.to_string(), (data, content_type.to_string()));
        Ok(StoredObject {
            url: format!("{}/{}", self.base_url.trim_end_matches('/'), path),
            storage_path: path.to_string(),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), BridgeError> {
        match self.objects.write().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(BridgeError::NotFound(path.to_string())),
        }
    }
}

/// Keeps encoded snapshots, so restoring goes through the same codec as SQLite.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drafts.read().await.is_empty()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save_draft(
        &self,
        reporter_id: &str,
        snapshot: &WizardSnapshot,
    ) -> Result<(), BridgeError> {
        let encoded = encode_snapshot(snapshot)
            .map_err(|error| BridgeError::Storage(error.to_string()))?;
        self.drafts
            .write()
            .await
            .insert(reporter_id.to_string(), encoded);
        Ok(())
    }

    async fn load_draft(&self, reporter_id: &str) -> Result<Option<WizardSnapshot>, BridgeError> {
        let drafts = self.drafts.read().await;
        drafts
            .get(reporter_id)
            .map(|bytes| decode_snapshot::<WizardSnapshot>(bytes))
            .transpose()
            .map_err(|error| BridgeError::Storage(format!("unreadable draft: {error}")))
    }

    async fn discard_draft(&self, reporter_id: &str) -> Result<bool, BridgeError> {
        Ok(self.drafts.write().await.remove(reporter_id).is_some())
    }
}

#[derive(Debug, Clone)]
pub struct StaticIdentity(pub Identity);

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_identity(&self) -> Result<Identity, BridgeError> {
        Ok(self.0.clone())
    }
}

/// `None` behaves like a user who declined the location prompt.
#[derive(Debug, Clone, Copy)]
pub struct FixedGeolocation(pub Option<GeoPoint>);

#[async_trait]
impl GeolocationProvider for FixedGeolocation {
    async fn locate(&self) -> Result<GeoPoint, BridgeError> {
        self.0
            .ok_or_else(|| BridgeError::PermissionDenied("location access denied".to_string()))
    }
}
