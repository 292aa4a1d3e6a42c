use casedesk_capture::CaptureConfig;
use casedesk_contract::RequestKind;
use casedesk_transfer::SequencerConfig;

use crate::validator::ValidationRules;

pub const DEFAULT_VOICE_NOTE_FILE_NAME: &str = "voice-note.webm";

#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub rules: ValidationRules,
    pub capture: CaptureConfig,
    pub sequencer: SequencerConfig,
    pub voice_note_file_name: String,
}

impl WizardConfig {
    pub fn for_kind(kind: RequestKind) -> Self {
        Self {
            rules: ValidationRules::for_kind(kind),
            capture: CaptureConfig::default(),
            sequencer: SequencerConfig::default(),
            voice_note_file_name: DEFAULT_VOICE_NOTE_FILE_NAME.to_string(),
        }
    }

    pub fn strict() -> Self {
        Self::for_kind(RequestKind::PatientComplaint)
    }

    pub fn loose() -> Self {
        Self::for_kind(RequestKind::GeneralReport)
    }

    pub fn kind(&self) -> RequestKind {
        self.rules.kind
    }
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self::strict()
    }
}
