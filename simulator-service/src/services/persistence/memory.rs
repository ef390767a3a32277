//! In-process transcript store.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::TranscriptSink;
use crate::models::{InteractionRecord, SessionRecord};

/// Keeps records in memory. Clones share the same storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryTranscriptStore {
    inner: Arc<Mutex<Records>>,
}

#[derive(Debug, Default)]
struct Records {
    sessions: Vec<SessionRecord>,
    interactions: Vec<InteractionRecord>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.inner
            .lock()
            .map(|records| records.sessions.clone())
            .unwrap_or_default()
    }

    pub fn interactions(&self) -> Vec<InteractionRecord> {
        self.inner
            .lock()
            .map(|records| records.interactions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptSink for MemoryTranscriptStore {
    async fn open_session(&self, record: &SessionRecord) -> Option<String> {
        let mut records = self.inner.lock().ok()?;
        records.sessions.push(record.clone());
        Some(format!("mem-{}", records.sessions.len()))
    }

    fn record_interaction(&self, record: InteractionRecord) {
        match self.inner.lock() {
            Ok(mut records) => records.interactions.push(record),
            Err(_) => tracing::warn!("Memory transcript store poisoned, interaction dropped"),
        }
    }

    async fn ping(&self) -> Result<(), service_core::error::AppError> {
        Ok(())
    }
}
