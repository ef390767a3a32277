//! The chat session controller.
//!
//! A [`ChatSession`] owns one participant's transcript, phase and turn count.
//! It builds the phase prompt, calls the relay, sanitizes the reply and hands
//! records to the transcript sink.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use super::phase::{next_phase, Phase};
use super::prompts::{ParticipantProfile, OPENING_MESSAGE};
use super::sanitize::sanitize;
use crate::models::{ChatTurn, InteractionRecord, Message, Role, SessionRecord};
use crate::services::metrics;
use crate::services::persistence::TranscriptSink;
use crate::services::relay::Relay;

/// Shown in place of a reply when the relay fails.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, there seems to be a technical problem. Please check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInitialResponse,
    Ready,
    AwaitingReply,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingInitialResponse => "awaiting_initial_response",
            SessionState::Ready => "ready",
            SessionState::AwaitingReply => "awaiting_reply",
            SessionState::Closed => "closed",
        }
    }
}

/// Identity of a session. The id starts as a local placeholder and is
/// replaced by the database id when the session-open write succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: String,
    pub user_id: String,
    pub state: SessionState,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("A reply is already in progress")]
    Busy,

    #[error("The session has not been started")]
    NotStarted,

    #[error("The session has already been started")]
    AlreadyStarted,

    #[error("The session is closed")]
    Closed,

    #[error("Message must not be empty")]
    EmptyMessage,
}

/// Result of a turn that reached the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model answered; the sanitized reply was appended.
    Replied(Message),
    /// The relay failed; the apology was appended and nothing was committed.
    Failed(Message),
}

impl TurnOutcome {
    pub fn message(&self) -> &Message {
        match self {
            TurnOutcome::Replied(m) | TurnOutcome::Failed(m) => m,
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, TurnOutcome::Replied(_))
    }
}

pub struct ChatSession {
    handle: SessionHandle,
    profile: ParticipantProfile,
    messages: Vec<Message>,
    phase: Phase,
    user_turn_count: u32,
    relay: Arc<dyn Relay>,
    sink: Arc<dyn TranscriptSink>,
}

impl ChatSession {
    pub fn new(
        user_id: impl Into<String>,
        profile: ParticipantProfile,
        relay: Arc<dyn Relay>,
        sink: Arc<dyn TranscriptSink>,
    ) -> Self {
        Self {
            handle: SessionHandle {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.into(),
                state: SessionState::Idle,
            },
            profile,
            messages: Vec::new(),
            phase: Phase::default(),
            user_turn_count: 0,
            relay,
            sink,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn state(&self) -> SessionState {
        self.handle.state
    }

    pub fn profile(&self) -> &ParticipantProfile {
        &self.profile
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn user_turn_count(&self) -> u32 {
        self.user_turn_count
    }

    /// Open the session and ask the model for its greeting.
    ///
    /// The opening message is not a user turn and is not shown.
    #[tracing::instrument(skip(self), fields(session_id = %self.handle.id))]
    pub async fn start(&mut self) -> Result<TurnOutcome, SessionError> {
        match self.handle.state {
            SessionState::Idle => {}
            SessionState::Closed => return Err(SessionError::Closed),
            _ => return Err(SessionError::AlreadyStarted),
        }
        self.handle.state = SessionState::AwaitingInitialResponse;

        if let Some(db_id) = self
            .sink
            .open_session(&SessionRecord::opened(self.handle.user_id.clone()))
            .await
        {
            tracing::debug!(placeholder = %self.handle.id, db_id = %db_id, "Session id assigned");
            self.handle.id = db_id;
        }

        let prompt = self.profile.system_prompt(Phase::Greeting);
        let started = Instant::now();
        let result = self.relay.relay(&[], &prompt, OPENING_MESSAGE).await;

        let outcome = match result {
            Ok(reply) => {
                let message = Message::assistant(sanitize(&reply.message));
                self.messages.push(message.clone());
                self.sink.record_interaction(self.interaction(
                    OPENING_MESSAGE,
                    reply.message,
                    Phase::Greeting,
                    started,
                ));
                tracing::info!(user_id = %self.handle.user_id, "Session started");
                TurnOutcome::Replied(message)
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), "Opening turn failed: {}", e);
                TurnOutcome::Failed(self.push_apology())
            }
        };

        self.handle.state = SessionState::Ready;
        Ok(outcome)
    }

    /// Send a participant message and wait for the reply.
    ///
    /// The phase is advanced before the prompt is built, so the message that
    /// triggers a transition is answered by the new phase. Count and phase are
    /// only committed when the relay succeeds.
    #[tracing::instrument(skip(self, text), fields(session_id = %self.handle.id, phase = %self.phase))]
    pub async fn submit(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        match self.handle.state {
            SessionState::Ready => {}
            SessionState::Idle => return Err(SessionError::NotStarted),
            SessionState::AwaitingInitialResponse | SessionState::AwaitingReply => {
                return Err(SessionError::Busy)
            }
            SessionState::Closed => return Err(SessionError::Closed),
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let history = self.context();
        self.messages.push(Message::user(text));

        let tentative_count = self.user_turn_count + 1;
        let target_phase = next_phase(self.phase, tentative_count);
        let prompt = self.profile.system_prompt(target_phase);

        self.handle.state = SessionState::AwaitingReply;
        let started = Instant::now();
        let result = self.relay.relay(&history, &prompt, text).await;

        let outcome = match result {
            Ok(reply) => {
                self.user_turn_count = tentative_count;
                if target_phase != self.phase {
                    tracing::info!(from = %self.phase, to = %target_phase, "Phase advanced");
                    metrics::record_phase_transition(self.phase, target_phase);
                    self.phase = target_phase;
                }

                let message = Message::assistant(sanitize(&reply.message));
                self.messages.push(message.clone());
                self.sink.record_interaction(self.interaction(
                    text,
                    reply.message,
                    target_phase,
                    started,
                ));
                TurnOutcome::Replied(message)
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), "Turn failed, phase not advanced: {}", e);
                TurnOutcome::Failed(self.push_apology())
            }
        };

        self.handle.state = SessionState::Ready;
        Ok(outcome)
    }

    /// Close this session and return a fresh one for the same participant.
    pub fn restart(mut self) -> ChatSession {
        self.close();
        tracing::info!(session_id = %self.handle.id, "Session restarted");
        ChatSession::new(self.handle.user_id, self.profile, self.relay, self.sink)
    }

    pub fn close(&mut self) {
        self.handle.state = SessionState::Closed;
    }

    /// Prior turns sent as model context. Status notes are excluded.
    fn context(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .filter(|m| m.role() != Role::System)
            .map(Message::to_turn)
            .collect()
    }

    fn push_apology(&mut self) -> Message {
        let message = Message::assistant(APOLOGY_MESSAGE);
        self.messages.push(message.clone());
        message
    }

    fn interaction(
        &self,
        user_message: &str,
        ai_response: String,
        phase: Phase,
        started: Instant,
    ) -> InteractionRecord {
        InteractionRecord {
            user_id: self.handle.user_id.clone(),
            user_message: user_message.to_string(),
            ai_response,
            phase,
            turn_number: self.user_turn_count + 1,
            session_id: self.handle.id.clone(),
            response_latency_ms: started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        }
    }
}
