use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::draft::{CaseCategory, DraftFields, GeoPoint, PatientDetails, ReporterId};

/// Which request shape a wizard produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    PatientComplaint,
    GeneralReport,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("attachment {file_name} has invalid content type {content_type}")]
    InvalidContentType {
        file_name: String,
        content_type: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommonFields {
    pub reporter_id: ReporterId,
    pub category: CaseCategory,
    pub title: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub description: String,
    pub location: Option<GeoPoint>,
    pub submitted_at: DateTime<Utc>,
}

/// Outgoing case payload, discriminated by `kind` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseRequest {
    PatientComplaint {
        #[serde(flatten)]
        common: CommonFields,
        patient: PatientDetails,
    },
    GeneralReport {
        #[serde(flatten)]
        common: CommonFields,
    },
}

impl CaseRequest {
    /// Builds the request from a frozen draft snapshot, checking the shape the
    /// record collaborator relies on.
    pub fn from_draft(
        fields: &DraftFields,
        kind: RequestKind,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, RequestError> {
        let category = fields.category.ok_or(RequestError::MissingField("category"))?;
        let common = CommonFields {
            reporter_id: require("reporter_id", &fields.reporter_id)?,
            category,
            title: require("title", &fields.title)?,
            full_name: require("full_name", &fields.contact.full_name)?,
            email: require("email", &fields.contact.email)?,
            phone: require("phone", &fields.contact.phone)?,
            description: require("description", &fields.description)?,
            location: fields.location,
            submitted_at,
        };

        if let Some(location) = common.location {
            if !(-90.0..=90.0).contains(&location.latitude)
                || !(-180.0..=180.0).contains(&location.longitude)
            {
                return Err(RequestError::InvalidField {
                    field: "location",
                    reason: format!("{}, {} is out of range", location.latitude, location.longitude),
                });
            }
        }

        for file in &fields.attachments {
            if file.content_type.parse::<mime::Mime>().is_err() {
                return Err(RequestError::InvalidContentType {
                    file_name: file.file_name.clone(),
                    content_type: file.content_type.clone(),
                });
            }
        }

        match kind {
            RequestKind::GeneralReport => Ok(CaseRequest::GeneralReport { common }),
            RequestKind::PatientComplaint => {
                if fields.patient.patient_age == 0 {
                    return Err(RequestError::InvalidField {
                        field: "patient_age",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Ok(CaseRequest::PatientComplaint {
                    common,
                    patient: fields.patient.clone(),
                })
            }
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            CaseRequest::PatientComplaint { .. } => RequestKind::PatientComplaint,
            CaseRequest::GeneralReport { .. } => RequestKind::GeneralReport,
        }
    }

    pub fn common(&self) -> &CommonFields {
        match self {
            CaseRequest::PatientComplaint { common, .. } => common,
            CaseRequest::GeneralReport { common } => common,
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<String, RequestError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(RequestError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}
