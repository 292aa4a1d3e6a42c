use std::sync::Arc;

use casedesk_bridge::{BlobStore, GeolocationProvider, Identity, RecordService};
use casedesk_capture::{AudioCaptureController, Microphone, RecordingStatus};
use casedesk_contract::{
    CaseRequest, DraftError, DraftFields, DraftStatus, FileHandle, FormDraft, GeoPoint, RecordId,
    RequestKind, UploadCategory, UploadedFile, VoiceNoteRef, WizardSnapshot,
};
use casedesk_transfer::{DeadLetter, UploadSequencer};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::WizardConfig;
use crate::cursor::WizardCursor;
use crate::error::{SubmissionError, WizardError};
use crate::validator::{first_failure, validate, Step, Validation};

/// Collaborators a wizard talks to.
#[derive(Clone)]
pub struct WizardServices {
    pub records: Arc<dyn RecordService>,
    pub blobs: Arc<dyn BlobStore>,
    pub microphone: Arc<dyn Microphone>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationOutcome {
    Captured(GeoPoint),
    /// Location is optional; the wizard carries on without it.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub record_id: RecordId,
    pub voice_note: Option<VoiceNoteRef>,
    pub attached: Vec<UploadedFile>,
    pub dropped: Vec<DeadLetter>,
}

impl SubmissionReport {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Multi-step case wizard. Owns the draft and the recording session for its
/// whole lifetime; nothing is uploaded before [`Wizard::submit`].
pub struct Wizard {
    config: WizardConfig,
    draft: FormDraft,
    cursor: WizardCursor,
    error: Option<String>,
    recorder: AudioCaptureController,
    records: Arc<dyn RecordService>,
    blobs: Arc<dyn BlobStore>,
    uploads: UploadSequencer,
}

impl Wizard {
    /// Fresh wizard with the contact step pre-filled from the signed-in user.
    pub fn open(identity: &Identity, config: WizardConfig, services: WizardServices) -> Self {
        let mut fields = DraftFields {
            reporter_id: identity.user_id.clone(),
            ..DraftFields::default()
        };
        fields.contact.full_name = identity.full_name.clone();
        fields.contact.email = identity.email.clone();
        fields.contact.phone = identity.phone.clone();

        info!(reporter_id = %identity.user_id, kind = ?config.kind(), "wizard opened");
        Self::assemble(config, FormDraft::new(fields), 1, services)
    }

    /// Reopens a wizard from a save point. A draft caught mid-submission is
    /// thawed so the user can retry.
    pub fn restore(
        snapshot: WizardSnapshot,
        config: WizardConfig,
        services: WizardServices,
    ) -> Result<Self, WizardError> {
        if snapshot.kind != config.kind() {
            return Err(WizardError::SnapshotMismatch {
                expected: config.kind(),
                found: snapshot.kind,
            });
        }

        let mut draft = snapshot.draft;
        draft.abort_submission();
        info!(
            reporter_id = %draft.fields().reporter_id,
            step = snapshot.step,
            "wizard restored from save point"
        );
        Ok(Self::assemble(config, draft, snapshot.step, services))
    }

    fn assemble(
        config: WizardConfig,
        draft: FormDraft,
        position: usize,
        services: WizardServices,
    ) -> Self {
        let recorder = AudioCaptureController::new(services.microphone, config.capture.clone());
        let uploads = UploadSequencer::new(services.blobs.clone(), config.sequencer.clone());
        Self {
            cursor: WizardCursor::at(config.rules.steps(), position),
            config,
            draft,
            error: None,
            recorder,
            records: services.records,
            blobs: services.blobs,
            uploads,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.config.kind()
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn fields(&self) -> &DraftFields {
        self.draft.fields()
    }

    pub fn step(&self) -> Step {
        self.cursor.step()
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn total_steps(&self) -> usize {
        self.cursor.total()
    }

    /// Reason the last forward move was refused, if it is still relevant.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.draft.status() == DraftStatus::Submitting
    }

    pub fn recorder(&self) -> &AudioCaptureController {
        &self.recorder
    }

    pub fn can_advance(&self) -> bool {
        validate(self.cursor.step(), self.draft.fields(), &self.config.rules).valid
    }

    pub fn can_submit(&self) -> bool {
        self.cursor.is_last()
            && self.draft.is_editable()
            && first_failure(self.draft.fields(), &self.config.rules).is_none()
    }

    pub fn edit<F>(&mut self, change: F) -> Result<(), WizardError>
    where
        F: FnOnce(&mut DraftFields),
    {
        self.draft.edit(change)?;
        Ok(())
    }

    pub fn attach(&mut self, file: FileHandle) -> Result<(), WizardError> {
        debug!(file_name = %file.file_name, "attachment queued");
        self.draft.attach(file)?;
        Ok(())
    }

    pub fn remove_attachment(&mut self, index: usize) -> Result<FileHandle, WizardError> {
        Ok(self.draft.remove_attachment(index)?)
    }

    pub fn next(&mut self) -> Validation {
        let step = self.cursor.step();
        let validation = validate(step, self.draft.fields(), &self.config.rules);
        if validation.valid {
            self.error = None;
            self.cursor.advance();
        } else {
            debug!(step = ?step, reason = ?validation.reason, "step rejected");
            self.error = validation.reason.clone();
        }
        validation
    }

    pub fn prev(&mut self) -> usize {
        self.cursor.retreat();
        self.error = None;
        self.cursor.position()
    }

    pub async fn start_recording(&mut self) -> Result<(), WizardError> {
        self.ensure_editable()?;
        self.recorder.start().await?;
        Ok(())
    }

    /// One simulated second of recording. Hitting the ceiling parks the note
    /// in the draft just like a manual stop.
    pub fn tick_recording(&mut self) -> RecordingStatus {
        let before = self.recorder.status();
        let after = self.recorder.tick();
        if before == RecordingStatus::Recording && after == RecordingStatus::Stopped {
            self.sync_voice_note();
        }
        after
    }

    pub fn stop_recording(&mut self) -> Result<u32, WizardError> {
        self.ensure_editable()?;
        self.recorder.stop()?;
        self.sync_voice_note();
        Ok(self.recorder.elapsed_secs())
    }

    /// Drops the recording and the note parked in the draft. Returns `false`
    /// when there was nothing to drop.
    pub fn delete_recording(&mut self) -> Result<bool, WizardError> {
        self.ensure_editable()?;
        let had_note = self.draft.fields().voice_note.is_some();
        let had_session = self.recorder.delete();
        self.draft.set_voice_note(None)?;
        Ok(had_note || had_session)
    }

    pub async fn capture_location(
        &mut self,
        geolocation: &dyn GeolocationProvider,
    ) -> Result<LocationOutcome, WizardError> {
        self.ensure_editable()?;
        match geolocation.locate().await {
            Ok(point) => {
                self.draft.edit(|fields| fields.location = Some(point))?;
                Ok(LocationOutcome::Captured(point))
            }
            Err(error) => {
                info!(error = %error, "location unavailable, continuing without it");
                Ok(LocationOutcome::Unavailable(error.to_string()))
            }
        }
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            kind: self.config.kind(),
            step: self.cursor.position(),
            draft: self.draft.clone(),
        }
    }

    /// Abandons the wizard, releasing the microphone and any preview handle.
    pub fn close(mut self) {
        let released = self.recorder.delete();
        info!(
            reporter_id = %self.draft.fields().reporter_id,
            recording_released = released,
            "wizard closed, draft discarded"
        );
    }

    /// Sends the case. The draft is frozen for the duration and thawed again if
    /// no record could be created.
    pub async fn submit(&mut self) -> Result<SubmissionReport, WizardError> {
        if !self.cursor.is_last() {
            return Err(WizardError::NotOnLastStep);
        }
        self.ensure_editable()?;

        if self.recorder.status() == RecordingStatus::Recording {
            let note = self.recorder.finish_for_submission();
            self.draft.set_voice_note(note)?;
        }

        if let Some((step, validation)) = first_failure(self.draft.fields(), &self.config.rules) {
            let reason = validation.reason.unwrap_or_default();
            self.error = Some(reason.clone());
            return Err(WizardError::Incomplete { step, reason });
        }

        let snapshot = self.draft.begin_submission()?;
        info!(
            reporter_id = %snapshot.reporter_id,
            attachments = snapshot.attachments.len(),
            has_voice_note = snapshot.voice_note.is_some(),
            "submission started"
        );

        match self.send(&snapshot).await {
            Ok(report) => {
                self.draft.complete_submission();
                self.error = None;
                info!(
                    record_id = %report.record_id,
                    attached = report.attached.len(),
                    dropped = report.dropped.len(),
                    "case submitted"
                );
                Ok(report)
            }
            Err(error) => {
                self.draft.abort_submission();
                warn!(error = %error, "submission rolled back");
                let error = WizardError::Submission(error);
                self.error = Some(error.user_message());
                Err(error)
            }
        }
    }

    async fn send(&self, fields: &DraftFields) -> Result<SubmissionReport, SubmissionError> {
        let request = CaseRequest::from_draft(fields, self.config.kind(), Utc::now())
            .map_err(|error| SubmissionError::InvalidRequest(error.to_string()))?;

        let voice_upload = match &fields.voice_note {
            Some(note) => {
                let handle = note.to_file_handle(self.config.voice_note_file_name.clone());
                let uploaded = self
                    .uploads
                    .upload(&handle, &fields.reporter_id, UploadCategory::VoiceRecording)
                    .await
                    .map_err(SubmissionError::VoiceNoteUpload)?;
                Some((uploaded, note.duration_secs))
            }
            None => None,
        };
        let voice_note = voice_upload.as_ref().map(|(uploaded, duration_secs)| VoiceNoteRef {
            url: uploaded.url.clone(),
            duration_secs: *duration_secs,
        });

        let record_id = match self.records.create_record(request, voice_note.clone()).await {
            Ok(record_id) => record_id,
            Err(error) => {
                if let Some((uploaded, _)) = &voice_upload {
                    self.discard_blob(&uploaded.storage_path).await;
                }
                return Err(SubmissionError::RecordCreation(error));
            }
        };

        let (attached, dropped) = self.deliver_attachments(&record_id, &fields.attachments).await;
        Ok(SubmissionReport {
            record_id,
            voice_note,
            attached,
            dropped,
        })
    }

    /// Best effort: the record already exists, so failures only produce dead letters.
    async fn deliver_attachments(
        &self,
        record_id: &str,
        files: &[FileHandle],
    ) -> (Vec<UploadedFile>, Vec<DeadLetter>) {
        if files.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut outcome = self
            .uploads
            .upload_batch(files, record_id, UploadCategory::CaseAttachment)
            .await;
        if outcome.uploaded.is_empty() {
            return (Vec::new(), outcome.dropped);
        }

        match self.records.attach_documents(record_id, &outcome.uploaded).await {
            Ok(()) => (outcome.uploaded, outcome.dropped),
            Err(error) => {
                warn!(record_id = %record_id, error = %error, "linking attachments failed");
                let orphans = outcome.unlink(&format!("uploaded but not linked: {error}"));
                for orphan in &orphans {
                    self.discard_blob(&orphan.storage_path).await;
                }
                (Vec::new(), outcome.dropped)
            }
        }
    }

    async fn discard_blob(&self, path: &str) {
        if let Err(error) = self.blobs.delete(path).await {
            warn!(path = %path, error = %error, "orphaned upload could not be removed");
        }
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        if self.draft.is_editable() {
            Ok(())
        } else {
            Err(DraftError::Frozen(self.draft.status()).into())
        }
    }

    fn sync_voice_note(&mut self) {
        let note = self.recorder.voice_note();
        if let Err(error) = self.draft.set_voice_note(note) {
            warn!(error = %error, "voice note not stored in draft");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use casedesk_bridge::{FixedGeolocation, Identity, InMemoryBlobStore, InMemoryRecordService};
    use casedesk_capture::{RecordingStatus, SimulatedMicrophone};
    use casedesk_contract::{CaseCategory, GeoPoint, RequestKind};

    use super::{LocationOutcome, Wizard, WizardServices};
    use crate::config::WizardConfig;
    use crate::error::WizardError;
    use crate::validator::Step;

    fn identity() -> Identity {
        Identity {
            user_id: "user-7".to_string(),
            full_name: "Grace Reporter".to_string(),
            email: "grace@example.org".to_string(),
            phone: "555 0100 77".to_string(),
        }
    }

    fn services(mic: &SimulatedMicrophone) -> WizardServices {
        WizardServices {
            records: Arc::new(InMemoryRecordService::new()),
            blobs: Arc::new(InMemoryBlobStore::default()),
            microphone: Arc::new(mic.clone()),
        }
    }

    #[test]
    fn open_prefills_contact_from_identity() {
        let mic = SimulatedMicrophone::granted(8);
        let wizard = Wizard::open(&identity(), WizardConfig::loose(), services(&mic));
        assert_eq!(wizard.fields().reporter_id, "user-7");
        assert_eq!(wizard.fields().contact.full_name, "Grace Reporter");
        assert_eq!(wizard.position(), 1);
        assert_eq!(wizard.total_steps(), 4);
    }

    #[test]
    fn next_keeps_the_rejection_reason_and_prev_never_validates() {
        let mic = SimulatedMicrophone::granted(8);
        let mut wizard = Wizard::open(&identity(), WizardConfig::loose(), services(&mic));

        assert!(!wizard.next().valid);
        assert_eq!(wizard.position(), 1);
        assert_eq!(wizard.error(), Some("please select a category"));

        wizard
            .edit(|fields| {
                fields.category = Some(CaseCategory::Billing);
                fields.title = "Double charge".to_string();
            })
            .expect("edit");
        assert!(wizard.can_advance());
        assert!(wizard.next().valid);
        assert_eq!(wizard.error(), None);
        assert_eq!(wizard.step(), Step::Contact);

        wizard.edit(|fields| fields.category = None).expect("edit");
        assert_eq!(wizard.prev(), 1);
        assert_eq!(wizard.prev(), 1);
    }

    #[tokio::test]
    async fn submit_requires_the_last_step() {
        let mic = SimulatedMicrophone::granted(8);
        let mut wizard = Wizard::open(&identity(), WizardConfig::loose(), services(&mic));
        assert!(matches!(wizard.submit().await, Err(WizardError::NotOnLastStep)));
    }

    #[tokio::test]
    async fn recording_is_mirrored_into_the_draft() {
        let mic = SimulatedMicrophone::granted(8);
        let mut wizard = Wizard::open(&identity(), WizardConfig::strict(), services(&mic));

        wizard.start_recording().await.expect("start");
        for _ in 0..3 {
            wizard.tick_recording();
        }
        assert_eq!(wizard.stop_recording().expect("stop"), 3);
        let note = wizard.fields().voice_note.clone().expect("note parked");
        assert_eq!(note.duration_secs, 3);

        assert!(wizard.delete_recording().expect("delete"));
        assert!(wizard.fields().voice_note.is_none());
        assert!(!wizard.delete_recording().expect("second delete"));
        assert_eq!(wizard.recorder().status(), RecordingStatus::Idle);
    }

    #[tokio::test]
    async fn location_denial_is_not_fatal() {
        let mic = SimulatedMicrophone::granted(8);
        let mut wizard = Wizard::open(&identity(), WizardConfig::loose(), services(&mic));

        let denied = wizard
            .capture_location(&FixedGeolocation(None))
            .await
            .expect("no error");
        assert!(matches!(denied, LocationOutcome::Unavailable(_)));
        assert!(wizard.fields().location.is_none());

        let point = GeoPoint {
            latitude: 52.52,
            longitude: 13.40,
        };
        let captured = wizard
            .capture_location(&FixedGeolocation(Some(point)))
            .await
            .expect("captured");
        assert_eq!(captured, LocationOutcome::Captured(point));
        assert_eq!(wizard.fields().location, Some(point));
    }

    #[tokio::test]
    async fn close_releases_an_active_microphone() {
        let mic = SimulatedMicrophone::granted(8);
        let mut wizard = Wizard::open(&identity(), WizardConfig::loose(), services(&mic));
        wizard.start_recording().await.expect("start");
        assert_eq!(mic.open_streams(), 1);

        wizard.close();
        assert_eq!(mic.open_streams(), 0);
    }

    #[test]
    fn snapshot_and_restore_keep_position_and_fields() {
        let mic = SimulatedMicrophone::granted(8);
        let mut wizard = Wizard::open(&identity(), WizardConfig::loose(), services(&mic));
        wizard
            .edit(|fields| {
                fields.category = Some(CaseCategory::Other);
                fields.title = "Lost property".to_string();
            })
            .expect("edit");
        wizard.next();

        let snapshot = wizard.snapshot();
        let restored =
            Wizard::restore(snapshot.clone(), WizardConfig::loose(), services(&mic)).expect("restore");
        assert_eq!(restored.position(), 2);
        assert_eq!(restored.fields(), wizard.fields());

        let mismatch = Wizard::restore(snapshot, WizardConfig::strict(), services(&mic));
        assert!(matches!(
            mismatch,
            Err(WizardError::SnapshotMismatch {
                expected: RequestKind::PatientComplaint,
                found: RequestKind::GeneralReport,
            })
        ));
    }
}
