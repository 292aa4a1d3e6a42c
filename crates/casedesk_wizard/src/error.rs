use casedesk_bridge::BridgeError;
use casedesk_capture::CaptureError;
use casedesk_contract::{DraftError, RequestKind};
use casedesk_transfer::UploadError;
use thiserror::Error;

use crate::validator::Step;

/// Why a submission was rolled back. No case record exists after any of these.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("voice note upload failed: {0}")]
    VoiceNoteUpload(#[source] UploadError),
    #[error("record creation failed: {0}")]
    RecordCreation(#[source] BridgeError),
    #[error("request rejected before sending: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("submission is only possible from the last step")]
    NotOnLastStep,
    #[error("step {step:?} is incomplete: {reason}")]
    Incomplete { step: Step, reason: String },
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("draft cannot be changed: {0}")]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("saved draft is a {found:?}, expected a {expected:?}")]
    SnapshotMismatch {
        expected: RequestKind,
        found: RequestKind,
    },
    #[error("identity unavailable: {0}")]
    Identity(#[source] BridgeError),
    #[error("draft store failed: {0}")]
    DraftStore(#[source] BridgeError),
}

impl WizardError {
    /// Text suitable for showing the user inline.
    pub fn user_message(&self) -> String {
        match self {
            WizardError::NotOnLastStep => "Please complete every step before submitting.".to_string(),
            WizardError::Incomplete { reason, .. } => reason.clone(),
            WizardError::Submission(_) => {
                "We could not submit your case. Your draft has been kept, please try again."
                    .to_string()
            }
            WizardError::Draft(_) => "This case is already being submitted.".to_string(),
            WizardError::Capture(CaptureError::PermissionDenied(_)) => {
                "Cannot access microphone. Check your browser permissions.".to_string()
            }
            WizardError::Capture(error) => error.to_string(),
            WizardError::SnapshotMismatch { .. } | WizardError::DraftStore(_) => {
                "Your saved draft could not be restored.".to_string()
            }
            WizardError::Identity(_) => "Please sign in again to continue.".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WizardError::Submission(_) | WizardError::DraftStore(_) | WizardError::Identity(_)
        )
    }
}
