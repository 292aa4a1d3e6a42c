use casedesk_contract::{DraftFields, RequestKind};
use serde::{Deserialize, Serialize};

pub const STRICT_MIN_DESCRIPTION_CHARS: usize = 100;
pub const MIN_PHONE_DIGITS: usize = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Category,
    Contact,
    Narrative,
    Evidence,
    Review,
}

impl Step {
    pub fn title(&self) -> &'static str {
        match self {
            Step::Category => "What happened",
            Step::Contact => "Your details",
            Step::Narrative => "Describe the incident",
            Step::Evidence => "Supporting evidence",
            Step::Review => "Review and submit",
        }
    }
}

const STRICT_STEPS: &[Step] = &[
    Step::Category,
    Step::Contact,
    Step::Narrative,
    Step::Evidence,
    Step::Review,
];

const LOOSE_STEPS: &[Step] = &[Step::Category, Step::Contact, Step::Narrative, Step::Evidence];

/// Validation profile of a wizard variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    pub kind: RequestKind,
    pub min_description_chars: usize,
    pub require_voice_note: bool,
    /// Email shape and phone digit count on top of non-empty checks.
    #[serde(default)]
    pub check_contact_format: bool,
}

impl ValidationRules {
    /// Patient complaints: patient details, a long narrative and a voice note.
    pub fn strict() -> Self {
        Self {
            kind: RequestKind::PatientComplaint,
            min_description_chars: STRICT_MIN_DESCRIPTION_CHARS,
            require_voice_note: true,
            check_contact_format: false,
        }
    }

    pub fn loose() -> Self {
        Self {
            kind: RequestKind::GeneralReport,
            min_description_chars: 1,
            require_voice_note: false,
            check_contact_format: false,
        }
    }

    pub fn for_kind(kind: RequestKind) -> Self {
        match kind {
            RequestKind::PatientComplaint => Self::strict(),
            RequestKind::GeneralReport => Self::loose(),
        }
    }

    pub fn steps(&self) -> &'static [Step] {
        match self.kind {
            RequestKind::PatientComplaint => STRICT_STEPS,
            RequestKind::GeneralReport => LOOSE_STEPS,
        }
    }

    fn requires_patient(&self) -> bool {
        self.kind == RequestKind::PatientComplaint
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::strict()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Checks the fields owned by `step`. Pure; never fails.
pub fn validate(step: Step, draft: &DraftFields, rules: &ValidationRules) -> Validation {
    match step {
        Step::Category => validate_category(draft),
        Step::Contact => validate_contact(draft, rules),
        Step::Narrative => validate_narrative(draft, rules),
        Step::Evidence | Step::Review => Validation::ok(),
    }
}

/// First step of the variant that rejects the draft, with its reason.
pub fn first_failure(draft: &DraftFields, rules: &ValidationRules) -> Option<(Step, Validation)> {
    rules.steps().iter().find_map(|step| {
        let validation = validate(*step, draft, rules);
        (!validation.valid).then_some((*step, validation))
    })
}

pub fn validate_all(draft: &DraftFields, rules: &ValidationRules) -> Validation {
    first_failure(draft, rules)
        .map(|(_, validation)| validation)
        .unwrap_or_else(Validation::ok)
}

fn validate_category(draft: &DraftFields) -> Validation {
    if draft.category.is_none() {
        return Validation::rejected("please select a category");
    }
    Validation::ok()
}

fn validate_contact(draft: &DraftFields, rules: &ValidationRules) -> Validation {
    let mut missing = Vec::new();
    if is_blank(&draft.title) {
        missing.push("title");
    }
    if is_blank(&draft.contact.full_name) {
        missing.push("full name");
    }
    if is_blank(&draft.contact.email) {
        missing.push("email");
    }
    if is_blank(&draft.contact.phone) {
        missing.push("phone");
    }
    if rules.requires_patient() {
        if is_blank(&draft.patient.patient_name) {
            missing.push("patient name");
        }
        if draft.patient.patient_age == 0 {
            missing.push("patient age");
        }
    }
    if !missing.is_empty() {
        return Validation::rejected(format!("missing required fields: {}", missing.join(", ")));
    }
    if !rules.check_contact_format {
        return Validation::ok();
    }

    if !looks_like_email(draft.contact.email.trim()) {
        return Validation::rejected("email address is not valid");
    }
    let digits = draft
        .contact
        .phone
        .chars()
        .filter(char::is_ascii_digit)
        .count();
    if digits < MIN_PHONE_DIGITS {
        return Validation::rejected(format!(
            "phone number must contain at least {MIN_PHONE_DIGITS} digits"
        ));
    }
    Validation::ok()
}

fn validate_narrative(draft: &DraftFields, rules: &ValidationRules) -> Validation {
    let length = draft.description.trim().chars().count();
    if length == 0 && rules.min_description_chars <= 1 {
        return Validation::rejected("description is required");
    }
    if length < rules.min_description_chars {
        return Validation::rejected(format!(
            "description must be at least {} characters (currently {length})",
            rules.min_description_chars
        ));
    }
    if rules.require_voice_note && draft.voice_note.is_none() {
        return Validation::rejected("a completed voice recording is required");
    }
    Validation::ok()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{first_failure, validate, validate_all, Step, ValidationRules};
    use casedesk_contract::{AudioBlob, CaseCategory, DraftFields, VoiceNote};

    fn contact_filled() -> DraftFields {
        let mut draft = DraftFields {
            category: Some(CaseCategory::Hygiene),
            title: "Dirty ward".to_string(),
            ..DraftFields::default()
        };
        draft.contact.full_name = "Ada Reporter".to_string();
        draft.contact.email = "ada@example.org".to_string();
        draft.contact.phone = "+1 555 010 0199".to_string();
        draft
    }

    #[test]
    fn empty_contact_names_every_missing_field() {
        let draft = DraftFields {
            title: "Dirty ward".to_string(),
            ..DraftFields::default()
        };
        let result = validate(Step::Contact, &draft, &ValidationRules::loose());
        assert!(!result.valid);
        assert_eq!(
            result.reason.as_deref(),
            Some("missing required fields: full name, email, phone")
        );
    }

    #[test]
    fn strict_contact_also_wants_the_patient() {
        let result = validate(Step::Contact, &contact_filled(), &ValidationRules::strict());
        assert_eq!(
            result.reason.as_deref(),
            Some("missing required fields: patient name, patient age")
        );
    }

    #[test]
    fn contact_only_needs_non_empty_fields_by_default() {
        let mut draft = contact_filled();
        draft.contact.email = "ada@localhost".to_string();
        draft.contact.phone = "12345".to_string();
        for rules in [ValidationRules::loose(), ValidationRules::strict()] {
            assert!(!rules.check_contact_format);
        }
        assert!(validate(Step::Contact, &draft, &ValidationRules::loose()).valid);
    }

    #[test]
    fn contact_requires_the_title() {
        let mut draft = contact_filled();
        draft.title = "  ".to_string();
        let result = validate(Step::Contact, &draft, &ValidationRules::loose());
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("missing required fields: title"));

        let empty = validate(Step::Contact, &DraftFields::default(), &ValidationRules::loose());
        assert_eq!(
            empty.reason.as_deref(),
            Some("missing required fields: title, full name, email, phone")
        );
    }

    #[test]
    fn category_step_only_checks_the_category() {
        let draft = DraftFields {
            category: Some(CaseCategory::Other),
            ..DraftFields::default()
        };
        assert!(validate(Step::Category, &draft, &ValidationRules::loose()).valid);
        assert_eq!(
            validate(Step::Category, &DraftFields::default(), &ValidationRules::loose())
                .reason
                .as_deref(),
            Some("please select a category")
        );
    }

    #[test]
    fn opt_in_contact_format_checks() {
        let rules = ValidationRules {
            check_contact_format: true,
            ..ValidationRules::loose()
        };
        let mut draft = contact_filled();
        draft.contact.email = "ada@localhost".to_string();
        assert_eq!(
            validate(Step::Contact, &draft, &rules).reason.as_deref(),
            Some("email address is not valid")
        );

        draft.contact.email = "ada@example.org".to_string();
        draft.contact.phone = "555-01".to_string();
        assert!(!validate(Step::Contact, &draft, &rules).valid);

        draft.contact.phone = "5550100".to_string();
        assert!(validate(Step::Contact, &draft, &rules).valid);
    }

    #[test]
    fn strict_narrative_counts_trimmed_characters() {
        let rules = ValidationRules::strict();
        let mut draft = contact_filled();
        draft.description = format!("  {}  ", "x".repeat(50));

        let short = validate(Step::Narrative, &draft, &rules);
        assert_eq!(
            short.reason.as_deref(),
            Some("description must be at least 100 characters (currently 50)")
        );

        draft.description = "x".repeat(100);
        assert_eq!(
            validate(Step::Narrative, &draft, &rules).reason.as_deref(),
            Some("a completed voice recording is required")
        );

        draft.voice_note = Some(VoiceNote {
            blob: AudioBlob {
                data: vec![1u8, 2, 3].into(),
                content_type: "audio/webm".to_string(),
            },
            duration_secs: 4,
        });
        assert!(validate(Step::Narrative, &draft, &rules).valid);
    }

    #[test]
    fn loose_narrative_only_needs_text() {
        let rules = ValidationRules::loose();
        let mut draft = contact_filled();
        assert_eq!(
            validate(Step::Narrative, &draft, &rules).reason.as_deref(),
            Some("description is required")
        );
        draft.description = "Short.".to_string();
        assert!(validate(Step::Narrative, &draft, &rules).valid);
    }

    #[test]
    fn evidence_and_review_accept_anything() {
        for rules in [ValidationRules::strict(), ValidationRules::loose()] {
            assert!(validate(Step::Evidence, &DraftFields::default(), &rules).valid);
            assert!(validate(Step::Review, &DraftFields::default(), &rules).valid);
        }
    }

    #[test]
    fn validate_all_reports_the_earliest_failure() {
        let rules = ValidationRules::loose();
        let mut draft = contact_filled();
        draft.category = None;
        draft.contact.email.clear();

        let (step, _) = first_failure(&draft, &rules).expect("failure");
        assert_eq!(step, Step::Category);

        draft.category = Some(CaseCategory::Other);
        draft.description = "Queue".to_string();
        assert_eq!(
            validate_all(&draft, &rules).reason.as_deref(),
            Some("missing required fields: email")
        );
    }

    #[test]
    fn variants_have_different_step_lists() {
        assert_eq!(ValidationRules::strict().steps().len(), 5);
        assert_eq!(ValidationRules::loose().steps().len(), 4);
        assert_eq!(ValidationRules::strict().steps().last(), Some(&Step::Review));
        assert_eq!(Step::Review.title(), "Review and submit");
    }
}
