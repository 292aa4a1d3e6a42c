use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Container type produced by the recorder.
pub const VOICE_NOTE_CONTENT_TYPE: &str = "audio/webm";

/// Logical bucket an upload lands in. Also the first segment of the storage path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum UploadCategory {
    VoiceRecording,
    CaseAttachment,
    ProfileImage,
    GalleryImage,
    Logo,
}

impl UploadCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadCategory::VoiceRecording => "voice-recording",
            UploadCategory::CaseAttachment => "case-attachment",
            UploadCategory::ProfileImage => "profile-image",
            UploadCategory::GalleryImage => "gallery-image",
            UploadCategory::Logo => "logo",
        }
    }
}

impl fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bytes of a pending file live until upload time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FileSource {
    Memory(Bytes),
    Path(PathBuf),
}

/// A file the user picked but that has not been uploaded yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileHandle {
    pub file_name: String,
    pub content_type: String,
    pub source: FileSource,
}

impl FileHandle {
    pub fn in_memory(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            source: FileSource::Memory(data.into()),
        }
    }

    pub fn on_disk(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            source: FileSource::Path(path.into()),
        }
    }
}

/// Finalized recording: all captured chunks concatenated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioBlob {
    pub data: Bytes,
    pub content_type: String,
}

impl AudioBlob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A completed recording parked in the draft until submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceNote {
    pub blob: AudioBlob,
    pub duration_secs: u32,
}

impl VoiceNote {
    pub fn to_file_handle(&self, file_name: impl Into<String>) -> FileHandle {
        FileHandle::in_memory(
            file_name,
            self.blob.content_type.clone(),
            self.blob.data.clone(),
        )
    }
}

/// Result of one successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub size: u64,
    pub storage_path: String,
    pub category: UploadCategory,
}

/// What the record collaborator receives about the voice note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoiceNoteRef {
    pub url: String,
    pub duration_secs: u32,
}
