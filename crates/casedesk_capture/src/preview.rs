use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use casedesk_contract::AudioBlob;
use uuid::Uuid;

/// Local playback handles for finished recordings. Every registered URL holds
/// the blob alive until it is revoked.
#[derive(Debug, Clone, Default)]
pub struct PreviewUrls {
    entries: Arc<Mutex<HashMap<String, AudioBlob>>>,
}

impl PreviewUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, blob: &AudioBlob) -> String {
        let url = format!("blob:casedesk/{}", Uuid::now_v7());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), blob.clone());
        url
    }

    pub fn resolve(&self, url: &str) -> Option<AudioBlob> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn revoke(&self, url: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
