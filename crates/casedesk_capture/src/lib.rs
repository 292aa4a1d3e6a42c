//! Voice-note capture for the case wizard.
//!
//! One [`AudioCaptureController`] owns at most one recording session and at
//! most one open microphone stream. The owner drives time by calling
//! [`AudioCaptureController::tick`] once per second; the controller stops
//! itself when the configured ceiling is reached.

pub mod controller;
pub mod microphone;
pub mod preview;

pub use controller::{
    AudioCaptureController, CaptureConfig, CaptureEvent, RecordingSession, RecordingStatus,
    StopReason, DEFAULT_MAX_DURATION_SECS,
};
pub use microphone::{CaptureError, Microphone, MicrophoneStream, SimulatedMicrophone};
pub use preview::PreviewUrls;
