use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::config::ProviderKind;
use crate::startup::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub model_configured: bool,
    pub model: Option<String>,
    pub provider: &'static str,
    pub persistence_enabled: bool,
    pub active_sessions: usize,
}

/// Configuration overview for operators. Never includes secret values.
pub async fn system_status(State(state): State<AppState>) -> impl IntoResponse {
    let provider = match state.config.genai.provider {
        ProviderKind::Gemini => "gemini",
        ProviderKind::Mock => "mock",
    };

    Json(SystemStatus {
        model_configured: state.relay.is_configured(),
        model: state.relay.model().map(str::to_string),
        provider,
        persistence_enabled: state.sink.is_enabled(),
        active_sessions: state.sessions.len(),
    })
}
