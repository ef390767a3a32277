//! Records written to the transcript database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::Phase;

pub const SESSION_STATUS_IN_PROGRESS: &str = "in_progress";

/// Written once when a session opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,

    /// Lifecycle marker; sessions are only ever opened as `in_progress`.
    pub status: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn opened(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            status: SESSION_STATUS_IN_PROGRESS.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// One answered turn. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: String,

    pub user_message: String,

    /// Raw model text, before sanitizing.
    pub ai_response: String,

    /// Phase whose template produced the answer.
    pub phase: Phase,

    /// 1 for the opening turn, then one more per answered user message.
    pub turn_number: u32,

    pub session_id: String,

    pub response_latency_ms: u64,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}
