pub mod codec;
pub mod draft;
pub mod media;
pub mod request;

pub use codec::{decode_snapshot, encode_snapshot, CodecError, SNAPSHOT_FORMAT_VERSION};
pub use draft::{
    CaseCategory, ContactDetails, DraftError, DraftFields, DraftStatus, FormDraft, GeoPoint,
    PatientDetails, RecordId, ReporterId, WizardSnapshot,
};
pub use media::{
    AudioBlob, FileHandle, FileSource, UploadCategory, UploadedFile, VoiceNote, VoiceNoteRef,
    VOICE_NOTE_CONTENT_TYPE,
};
pub use request::{CaseRequest, CommonFields, RequestError, RequestKind};
