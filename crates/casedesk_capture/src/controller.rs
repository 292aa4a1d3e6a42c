use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use casedesk_contract::{AudioBlob, VoiceNote, VOICE_NOTE_CONTENT_TYPE};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::microphone::{CaptureError, Microphone, MicrophoneStream};
use crate::preview::PreviewUrls;

pub const DEFAULT_MAX_DURATION_SECS: u32 = 300;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub max_duration_secs: u32,
    pub content_type: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            content_type: VOICE_NOTE_CONTENT_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStatus {
    Idle,
    RequestingPermission,
    Recording,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ManualStop,
    MaxDuration,
    /// Stopped by the wizard so the note could be submitted.
    Submission,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::ManualStop => "manual_stop",
            StopReason::MaxDuration => "max_duration",
            StopReason::Submission => "submission",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    StatusChanged {
        from: RecordingStatus,
        to: RecordingStatus,
    },
    Tick {
        elapsed_secs: u32,
    },
    Finalized {
        reason: StopReason,
        elapsed_secs: u32,
        bytes: usize,
    },
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    status: RecordingStatus,
    elapsed_secs: u32,
    chunks: Vec<Bytes>,
    blob: Option<AudioBlob>,
    preview_url: Option<String>,
    stop_reason: Option<StopReason>,
    error: Option<String>,
}

impl RecordingSession {
    fn idle() -> Self {
        Self {
            status: RecordingStatus::Idle,
            elapsed_secs: 0,
            chunks: Vec::new(),
            blob: None,
            preview_url: None,
            stop_reason: None,
            error: None,
        }
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    pub fn buffered_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn blob(&self) -> Option<&AudioBlob> {
        self.blob.as_ref()
    }

    pub fn preview_url(&self) -> Option<&str> {
        self.preview_url.as_deref()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

pub struct AudioCaptureController {
    microphone: Arc<dyn Microphone>,
    config: CaptureConfig,
    session: RecordingSession,
    stream: Option<Box<dyn MicrophoneStream>>,
    previews: PreviewUrls,
    events: broadcast::Sender<CaptureEvent>,
}

impl AudioCaptureController {
    pub fn new(microphone: Arc<dyn Microphone>, config: CaptureConfig) -> Self {
        Self::with_previews(microphone, config, PreviewUrls::new())
    }

    pub fn with_previews(
        microphone: Arc<dyn Microphone>,
        mut config: CaptureConfig,
        previews: PreviewUrls,
    ) -> Self {
        config.max_duration_secs = config.max_duration_secs.max(1);
        let (events, _) = broadcast::channel(64);
        Self {
            microphone,
            config,
            session: RecordingSession::idle(),
            stream: None,
            previews,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn status(&self) -> RecordingStatus {
        self.session.status
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.session.elapsed_secs
    }

    pub fn max_duration_secs(&self) -> u32 {
        self.config.max_duration_secs
    }

    pub fn previews(&self) -> &PreviewUrls {
        &self.previews
    }

    pub fn holds_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Requests the microphone and begins recording.
    ///
    /// Only valid from `Idle`. A denial leaves the session in `Error` until it
    /// is deleted.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.session.status != RecordingStatus::Idle {
            return Err(CaptureError::SessionActive(self.session.status));
        }

        self.transition(RecordingStatus::RequestingPermission);
        match self.microphone.open().await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.transition(RecordingStatus::Recording);
                info!(
                    max_duration_secs = self.config.max_duration_secs,
                    "voice recording started"
                );
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "microphone unavailable");
                self.session.error = Some(error.to_string());
                self.transition(RecordingStatus::Error);
                Err(error)
            }
        }
    }

    /// Advances the session by one second. Returns the status after the tick.
    pub fn tick(&mut self) -> RecordingStatus {
        if self.session.status != RecordingStatus::Recording {
            return self.session.status;
        }

        self.pull_chunk();
        self.session.elapsed_secs += 1;
        self.emit(CaptureEvent::Tick {
            elapsed_secs: self.session.elapsed_secs,
        });

        if self.session.elapsed_secs >= self.config.max_duration_secs {
            info!(
                elapsed_secs = self.session.elapsed_secs,
                "recording ceiling reached"
            );
            self.finalize(StopReason::MaxDuration);
        }
        self.session.status
    }

    pub fn stop(&mut self) -> Result<&AudioBlob, CaptureError> {
        if self.session.status != RecordingStatus::Recording {
            return Err(CaptureError::NotRecording);
        }
        self.finalize(StopReason::ManualStop);
        self.session.blob.as_ref().ok_or(CaptureError::NotRecording)
    }

    /// Stops an in-progress recording and returns the finished note, if any.
    pub fn finish_for_submission(&mut self) -> Option<VoiceNote> {
        if self.session.status == RecordingStatus::Recording {
            self.finalize(StopReason::Submission);
        }
        self.voice_note()
    }

    pub fn voice_note(&self) -> Option<VoiceNote> {
        if self.session.status != RecordingStatus::Stopped {
            return None;
        }
        self.session.blob.as_ref().map(|blob| VoiceNote {
            blob: blob.clone(),
            duration_secs: self.session.elapsed_secs,
        })
    }

    /// Discards the session from any state, closing the stream and revoking the
    /// preview. Returns `false` when there was nothing to discard.
    pub fn delete(&mut self) -> bool {
        let nothing_held = self.session == RecordingSession::idle() && self.stream.is_none();
        if nothing_held {
            return false;
        }

        self.release();
        let from = self.session.status;
        self.session = RecordingSession::idle();
        if from != RecordingStatus::Idle {
            self.emit(CaptureEvent::StatusChanged {
                from,
                to: RecordingStatus::Idle,
            });
        }
        debug!("recording session deleted");
        true
    }

    fn finalize(&mut self, reason: StopReason) {
        self.pull_chunk();
        self.close_stream();

        let total = self.session.chunks.iter().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in self.session.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        let blob = AudioBlob {
            data: data.freeze(),
            content_type: self.config.content_type.clone(),
        };

        self.session.preview_url = Some(self.previews.register(&blob));
        self.session.blob = Some(blob);
        self.session.stop_reason = Some(reason);
        self.transition(RecordingStatus::Stopped);
        self.emit(CaptureEvent::Finalized {
            reason,
            elapsed_secs: self.session.elapsed_secs,
            bytes: total,
        });
        info!(
            reason = reason.label(),
            elapsed_secs = self.session.elapsed_secs,
            bytes = total,
            "voice recording finalized"
        );
    }

    fn pull_chunk(&mut self) {
        if let Some(chunk) = self.stream.as_mut().and_then(|stream| stream.read_chunk()) {
            self.session.chunks.push(chunk);
        }
    }

    fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            self.emit(CaptureEvent::Released);
        }
    }

    fn release(&mut self) {
        self.close_stream();
        self.session.chunks.clear();
        if let Some(url) = self.session.preview_url.take() {
            self.previews.revoke(&url);
        }
    }

    fn transition(&mut self, to: RecordingStatus) {
        let from = self.session.status;
        self.session.status = to;
        debug!(from = ?from, to = ?to, "recording status changed");
        self.emit(CaptureEvent::StatusChanged { from, to });
    }

    fn emit(&self, event: CaptureEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        self.release();
    }
}
