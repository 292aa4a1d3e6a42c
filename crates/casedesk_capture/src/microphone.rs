use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::controller::RecordingStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("cannot access microphone: {0}")]
    PermissionDenied(String),
    #[error("a recording session is already in progress ({0:?})")]
    SessionActive(RecordingStatus),
    #[error("no recording in progress")]
    NotRecording,
}

/// An open hardware stream. Yields one encoded chunk per timeslice.
pub trait MicrophoneStream: Send {
    fn read_chunk(&mut self) -> Option<Bytes>;

    /// Releases the device. Must be safe to call more than once.
    fn close(&mut self);
}

#[async_trait]
pub trait Microphone: Send + Sync {
    /// Asks for access and opens a stream. Suspends while the user decides.
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>, CaptureError>;
}

/// Stand-in device for tests and the CLI. Tracks open streams so callers can
/// assert that the device is released.
#[derive(Debug, Clone)]
pub struct SimulatedMicrophone {
    granted: bool,
    chunk_bytes: usize,
    open_streams: Arc<AtomicUsize>,
    opened_total: Arc<AtomicUsize>,
}

impl SimulatedMicrophone {
    pub fn granted(chunk_bytes: usize) -> Self {
        Self {
            granted: true,
            chunk_bytes,
            open_streams: Arc::new(AtomicUsize::new(0)),
            opened_total: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            ..Self::granted(0)
        }
    }

    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Microphone for SimulatedMicrophone {
    async fn open(&self) -> Result<Box<dyn MicrophoneStream>, CaptureError> {
        if !self.granted {
            return Err(CaptureError::PermissionDenied(
                "permission dismissed by user".to_string(),
            ));
        }
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedStream {
            chunk_bytes: self.chunk_bytes,
            sequence: 0,
            open_streams: Arc::clone(&self.open_streams),
            closed: false,
        }))
    }
}

struct SimulatedStream {
    chunk_bytes: usize,
    sequence: u8,
    open_streams: Arc<AtomicUsize>,
    closed: bool,
}

impl MicrophoneStream for SimulatedStream {
    fn read_chunk(&mut self) -> Option<Bytes> {
        if self.closed || self.chunk_bytes == 0 {
            return None;
        }
        self.sequence = self.sequence.wrapping_add(1);
        Some(Bytes::from(vec![self.sequence; self.chunk_bytes]))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        self.close();
    }
}
