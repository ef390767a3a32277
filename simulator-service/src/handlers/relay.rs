use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::services::relay::{ChatRequest, ChatResponse};
use crate::services::Relay;
use crate::startup::AppState;

/// `POST /api/chat`: one model turn for a remote chat session.
#[tracing::instrument(skip_all)]
pub async fn chat_relay(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if payload.user_message.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("User message is required")));
    }
    payload.validate()?;

    let reply = state
        .relay
        .relay(&payload.messages, &payload.system_prompt, &payload.user_message)
        .await?;

    Ok(Json(reply.into()))
}
