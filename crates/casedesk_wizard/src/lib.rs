//! Case-submission wizard: step validation, navigation, and the terminal
//! submission sequence that turns a draft into a stored case.

pub mod app;
pub mod config;
pub mod cursor;
pub mod error;
pub mod validator;
pub mod wizard;

pub use app::{AppState, WizardUpdate};
pub use config::{WizardConfig, DEFAULT_VOICE_NOTE_FILE_NAME};
pub use cursor::WizardCursor;
pub use error::{SubmissionError, WizardError};
pub use validator::{
    first_failure, validate, validate_all, Step, Validation, ValidationRules, MIN_PHONE_DIGITS,
    STRICT_MIN_DESCRIPTION_CHARS,
};
pub use wizard::{LocationOutcome, SubmissionReport, Wizard, WizardServices};
