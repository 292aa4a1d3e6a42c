use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{FileHandle, VoiceNote};
use crate::request::RequestKind;

pub type ReporterId = String;
pub type RecordId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseCategory {
    MedicalNegligence,
    Billing,
    StaffConduct,
    Hygiene,
    WaitingTime,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

/// Only collected by the patient-complaint variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientDetails {
    pub patient_name: String,
    pub patient_age: u32,
    pub hospital_name: String,
    pub department: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Everything the user typed or picked. Editable only through [`FormDraft::edit`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftFields {
    pub reporter_id: ReporterId,
    pub category: Option<CaseCategory>,
    pub title: String,
    pub contact: ContactDetails,
    pub description: String,
    pub patient: PatientDetails,
    pub location: Option<GeoPoint>,
    pub attachments: Vec<FileHandle>,
    pub voice_note: Option<VoiceNote>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("draft is frozen while status is {0:?}")]
    Frozen(DraftStatus),
    #[error("no attachment at index {0}")]
    NoSuchAttachment(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormDraft {
    fields: DraftFields,
    status: DraftStatus,
    created_at: DateTime<Utc>,
}

impl FormDraft {
    pub fn new(fields: DraftFields) -> Self {
        Self {
            fields,
            status: DraftStatus::Draft,
            created_at: Utc::now(),
        }
    }

    pub fn fields(&self) -> &DraftFields {
        &self.fields
    }

    pub fn status(&self) -> DraftStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_editable(&self) -> bool {
        self.status == DraftStatus::Draft
    }

    /// Applies `change` to the fields while the draft is still a draft.
    pub fn edit<F>(&mut self, change: F) -> Result<(), DraftError>
    where
        F: FnOnce(&mut DraftFields),
    {
        if !self.is_editable() {
            return Err(DraftError::Frozen(self.status));
        }
        change(&mut self.fields);
        Ok(())
    }

    pub fn attach(&mut self, file: FileHandle) -> Result<(), DraftError> {
        self.edit(|fields| fields.attachments.push(file))
    }

    pub fn remove_attachment(&mut self, index: usize) -> Result<FileHandle, DraftError> {
        if !self.is_editable() {
            return Err(DraftError::Frozen(self.status));
        }
        if index >= self.fields.attachments.len() {
            return Err(DraftError::NoSuchAttachment(index));
        }
        Ok(self.fields.attachments.remove(index))
    }

    pub fn set_voice_note(&mut self, note: Option<VoiceNote>) -> Result<(), DraftError> {
        self.edit(|fields| fields.voice_note = note)
    }

    /// Freezes the draft and hands back the snapshot the submission works from.
    pub fn begin_submission(&mut self) -> Result<DraftFields, DraftError> {
        if !self.is_editable() {
            return Err(DraftError::Frozen(self.status));
        }
        self.status = DraftStatus::Submitting;
        Ok(self.fields.clone())
    }

    /// Thaws a draft whose submission failed so the user can retry.
    pub fn abort_submission(&mut self) {
        if self.status == DraftStatus::Submitting {
            self.status = DraftStatus::Draft;
        }
    }

    pub fn complete_submission(&mut self) {
        if self.status == DraftStatus::Submitting {
            self.status = DraftStatus::Submitted;
        }
    }
}

/// What gets persisted at a save point: enough to reopen the wizard where the
/// user left it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WizardSnapshot {
    pub kind: RequestKind,
    pub step: usize,
    pub draft: FormDraft,
}
