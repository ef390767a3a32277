//! Best-effort transcript persistence.
//!
//! Writes never block the chat path for long and never fail it: every error
//! is logged, counted and swallowed.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::models::{InteractionRecord, SessionRecord};

pub use memory::MemoryTranscriptStore;
pub use mongo::MongoTranscriptStore;

#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Write the session-open record. Returns the database id when the write
    /// succeeded in time.
    async fn open_session(&self, record: &SessionRecord) -> Option<String>;

    /// Queue an interaction write. Returns immediately.
    fn record_interaction(&self, record: InteractionRecord);

    /// Connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), service_core::error::AppError>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Sink used when no database is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTranscriptSink;

#[async_trait]
impl TranscriptSink for DisabledTranscriptSink {
    async fn open_session(&self, _record: &SessionRecord) -> Option<String> {
        None
    }

    fn record_interaction(&self, record: InteractionRecord) {
        tracing::debug!(
            session_id = %record.session_id,
            turn_number = record.turn_number,
            "Persistence disabled, interaction not stored"
        );
    }

    async fn ping(&self) -> Result<(), service_core::error::AppError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
