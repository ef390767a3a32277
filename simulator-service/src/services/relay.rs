//! The relay between a chat session and the hosted model.
//!
//! [`ProviderRelay`] calls a [`TextProvider`] in process; [`HttpRelayClient`]
//! calls the `/api/chat` endpoint of a running service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use validator::Validate;

use super::metrics;
use super::providers::{GenerationParams, ProviderError, TextProvider};
use crate::conversation::OPENING_MESSAGE;
use crate::models::{ChatTurn, Role};

/// Upper bound on a single participant message.
pub const MAX_USER_MESSAGE_CHARS: u64 = 8_000;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("User message is required")]
    EmptyMessage,

    #[error("Model credential not configured: {0}")]
    NotConfigured(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed relay response: {0}")]
    MalformedResponse(String),

    #[error("Relay rejected the request ({status}): {error}")]
    Rejected { status: u16, error: String },
}

impl RelayError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::EmptyMessage => "empty_message",
            RelayError::NotConfigured(_) => "not_configured",
            RelayError::Upstream(_) => "upstream",
            RelayError::Transport(_) => "transport",
            RelayError::MalformedResponse(_) => "malformed",
            RelayError::Rejected { .. } => "rejected",
        }
    }
}

impl From<ProviderError> for RelayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => RelayError::NotConfigured(msg),
            ProviderError::NetworkError(msg) => RelayError::Transport(msg),
            ProviderError::MalformedResponse(msg) => RelayError::MalformedResponse(msg),
            other => RelayError::Upstream(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait Relay: Send + Sync {
    /// Generate the assistant reply for `user_message` under `system_prompt`.
    async fn relay(
        &self,
        history: &[ChatTurn],
        system_prompt: &str,
        user_message: &str,
    ) -> Result<RelayReply, RelayError>;
}

// ============================================================================
// Wire types for POST /api/chat
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatTurn>,

    #[serde(default)]
    pub system_prompt: String,

    #[serde(default)]
    #[validate(length(max = MAX_USER_MESSAGE_CHARS))]
    pub user_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<RelayReply> for ChatResponse {
    fn from(reply: RelayReply) -> Self {
        Self {
            success: true,
            message: reply.message,
            timestamp: reply.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

// ============================================================================
// History folding
// ============================================================================

/// Normalise prior turns for the model.
///
/// System turns are dropped, consecutive turns from the same author are
/// merged, and a conversation that begins with an assistant turn gets the
/// opening message in front so the first turn is always the user's.
pub fn fold_history(history: &[ChatTurn]) -> Vec<ChatTurn> {
    let mut folded: Vec<ChatTurn> = Vec::with_capacity(history.len() + 1);

    for turn in history.iter().filter(|t| t.role != Role::System) {
        match folded.last_mut() {
            Some(last) if last.role == turn.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.content);
            }
            _ => folded.push(turn.clone()),
        }
    }

    if folded.first().is_some_and(|t| t.role == Role::Assistant) {
        folded.insert(0, ChatTurn::new(Role::User, OPENING_MESSAGE));
    }

    folded
}

/// Final user turn: the phase instructions followed by the participant's text.
pub fn compose_final_turn(system_prompt: &str, user_message: &str) -> String {
    format!("{}\n\n{}", system_prompt, user_message)
}

// ============================================================================
// In-process relay
// ============================================================================

pub struct ProviderRelay {
    provider: Option<Arc<dyn TextProvider>>,
    params: GenerationParams,
}

impl ProviderRelay {
    pub fn new(provider: Arc<dyn TextProvider>, params: GenerationParams) -> Self {
        Self {
            provider: Some(provider),
            params,
        }
    }

    /// A relay with no model credential. Every call fails as not configured.
    pub fn unconfigured() -> Self {
        Self {
            provider: None,
            params: GenerationParams::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.model())
    }
}

#[async_trait]
impl Relay for ProviderRelay {
    #[tracing::instrument(skip_all, fields(history_len = history.len()))]
    async fn relay(
        &self,
        history: &[ChatTurn],
        system_prompt: &str,
        user_message: &str,
    ) -> Result<RelayReply, RelayError> {
        if user_message.trim().is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        let provider = self.provider.as_ref().ok_or_else(|| {
            RelayError::NotConfigured("no model credential available".to_string())
        })?;

        let mut turns = fold_history(history);
        let mut prompt = compose_final_turn(system_prompt, user_message);
        // The final turn is the user's, so a trailing user turn joins it.
        if turns.last().is_some_and(|t| t.role == Role::User) {
            if let Some(last) = turns.pop() {
                prompt = format!("{}\n\n{}", last.content, prompt);
            }
        }

        let started = Instant::now();
        let result = provider.generate(&turns, &prompt, &self.params).await;
        let latency = started.elapsed();

        match result {
            Ok(response) => {
                metrics::record_relay(provider.model(), "success", latency);
                tracing::info!(
                    model = %provider.model(),
                    input_tokens = response.input_tokens,
                    output_tokens = response.output_tokens,
                    finish_reason = response.finish_reason.as_str(),
                    latency_ms = latency.as_millis() as u64,
                    "Model reply generated"
                );
                Ok(RelayReply {
                    message: response.text,
                    timestamp: Utc::now(),
                })
            }
            Err(e) => {
                let err = RelayError::from(e);
                metrics::record_relay(provider.model(), err.kind(), latency);
                tracing::error!(model = %provider.model(), kind = err.kind(), "Relay call failed: {}", err);
                Err(err)
            }
        }
    }
}

// ============================================================================
// Remote relay
// ============================================================================

/// Calls `POST {base_url}/api/chat`.
pub struct HttpRelayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Relay for HttpRelayClient {
    async fn relay(
        &self,
        history: &[ChatTurn],
        system_prompt: &str,
        user_message: &str,
    ) -> Result<RelayReply, RelayError> {
        if user_message.trim().is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        let body = ChatRequest {
            messages: history.to_vec(),
            system_prompt: system_prompt.to_string(),
            user_message: user_message.to_string(),
        };

        let response = self
            .client
            .traced_post(&self.endpoint)
            .json(&body)
            .send(None)
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error = match response.json::<RelayErrorBody>().await {
                Ok(body) => match body.details {
                    Some(details) => format!("{}: {}", body.error, details),
                    None => body.error,
                },
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            return Err(RelayError::Rejected {
                status: status.as_u16(),
                error,
            });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| RelayError::MalformedResponse(e.to_string()))?;

        if !reply.success {
            return Err(RelayError::MalformedResponse(
                "relay reported success: false".to_string(),
            ));
        }

        Ok(RelayReply {
            message: reply.message,
            timestamp: reply.timestamp,
        })
    }
}
