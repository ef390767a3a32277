//! Browser pages: the access gate and the chat transcript.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::error::AppError;
use service_core::utils::secrets_match;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tower_sessions::Session;

use crate::conversation::{ChatSession, ParticipantProfile, Phase, SessionError, SessionState};
use crate::models::Role;
use crate::services::registry::SessionSlot;
use crate::startup::AppState;

/// Tower-session key holding the browser's chat registry key.
pub const CHAT_KEY: &str = "chat_key";

/// How long the transcript page waits for a running turn before showing the
/// pending view.
const PAGE_LOCK_WAIT: Duration = Duration::from_secs(2);

#[derive(Template)]
#[template(path = "access_denied.html")]
pub struct AccessDeniedTemplate {}

pub struct MessageView {
    pub css_class: &'static str,
    pub author: String,
    pub content: String,
}

#[derive(Template)]
#[template(path = "chat.html")]
pub struct ChatTemplate {
    pub display_name: String,
    pub role_label: String,
    pub phase_number: u8,
    pub phase_total: usize,
    pub messages: Vec<MessageView>,
    pub pending: bool,
    pub can_send: bool,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub code: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageForm {
    pub message: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn access_denied() -> Response {
    (StatusCode::FORBIDDEN, AccessDeniedTemplate {}).into_response()
}

async fn chat_key(session: &Session) -> Result<Option<String>, AppError> {
    session
        .get::<String>(CHAT_KEY)
        .await
        .map_err(|e| AppError::InternalError(e.into()))
}

/// Run the opening turn in its own task so a closed connection cannot cancel
/// it. The slot stays locked until the greeting has arrived.
fn spawn_start(mut guard: OwnedMutexGuard<SessionSlot>) {
    tokio::spawn(async move {
        if let Some(chat) = guard.session_mut() {
            if let Err(e) = chat.start().await {
                tracing::warn!("Session start rejected: {}", e);
            }
        }
    });
}

/// `GET /`: check the access code and open a session for the named participant.
#[tracing::instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<AccessQuery>,
) -> Result<Response, AppError> {
    let code = query.code.unwrap_or_default();
    let authorized = secrets_match(state.config.access.code.expose_secret(), code.trim());

    let name = match non_blank(query.name) {
        Some(name) if authorized => name,
        _ => {
            tracing::warn!(authorized, "Access denied");
            return Ok(access_denied());
        }
    };

    let profile = ParticipantProfile::new(
        name,
        non_blank(query.role).unwrap_or_else(|| state.config.access.default_role_label.clone()),
        non_blank(query.gender)
            .unwrap_or_else(|| state.config.access.default_gender_label.clone()),
    );

    let key = match chat_key(&session).await? {
        Some(key) => key,
        None => {
            let key = uuid::Uuid::new_v4().to_string();
            session
                .insert(CHAT_KEY, &key)
                .await
                .map_err(|e| AppError::InternalError(e.into()))?;
            key
        }
    };

    let chat = ChatSession::new(
        key.clone(),
        profile,
        state.relay.clone(),
        state.sink.clone(),
    );
    // Same rule as restart: a running turn is never swapped out.
    let guard = state
        .sessions
        .admit(key.clone(), chat)
        .map_err(|_| SessionError::Busy)?;
    spawn_start(guard);

    tracing::info!(chat_key = %key, "Participant admitted");
    Ok(Redirect::to("/chat").into_response())
}

/// `GET /chat`: render the transcript.
pub async fn chat_page(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let Some(slot) = chat_key(&session)
        .await?
        .and_then(|key| state.sessions.get(&key))
    else {
        return Ok(Redirect::to("/").into_response());
    };

    let guard = match tokio::time::timeout(PAGE_LOCK_WAIT, slot.lock()).await {
        Ok(guard) => guard,
        Err(_) => return Ok(pending_page().into_response()),
    };

    let Some(chat) = guard.session() else {
        return Ok(Redirect::to("/").into_response());
    };

    Ok(render_chat(chat).into_response())
}

fn pending_page() -> ChatTemplate {
    ChatTemplate {
        display_name: String::new(),
        role_label: String::new(),
        phase_number: 0,
        phase_total: Phase::ALL.len(),
        messages: Vec::new(),
        pending: true,
        can_send: false,
    }
}

fn render_chat(chat: &ChatSession) -> ChatTemplate {
    let profile = chat.profile();
    let messages = chat
        .messages()
        .iter()
        .map(|m| {
            let (css_class, author) = match m.role() {
                Role::User => ("user", profile.display_name.clone()),
                Role::Assistant => ("assistant", "Alex".to_string()),
                Role::System => ("system", "Note".to_string()),
            };
            MessageView {
                css_class,
                author,
                content: m.content().to_string(),
            }
        })
        .collect();

    ChatTemplate {
        display_name: profile.display_name.clone(),
        role_label: profile.role_label.clone(),
        phase_number: chat.phase().number(),
        phase_total: Phase::ALL.len(),
        messages,
        pending: chat.state() == SessionState::Idle,
        can_send: chat.state() == SessionState::Ready,
    }
}

/// `POST /chat/messages`: run one turn, then redirect back to the transcript.
#[tracing::instrument(skip_all)]
pub async fn submit_message(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<MessageForm>,
) -> Result<Response, AppError> {
    let key = chat_key(&session)
        .await?
        .ok_or_else(|| AppError::from(SessionError::NotStarted))?;

    let guard = match state.sessions.try_lock(&key) {
        None => return Err(SessionError::NotStarted.into()),
        Some(Err(_)) => return Err(SessionError::Busy.into()),
        Some(Ok(guard)) => guard,
    };

    // The turn owns the lock, so dropping this request cannot cancel it.
    let turn = tokio::spawn(async move {
        let mut guard = guard;
        match guard.session_mut() {
            Some(chat) => chat.submit(&form.message).await.map(|_| ()),
            None => Err(SessionError::NotStarted),
        }
    });

    turn.await
        .map_err(|e| AppError::InternalError(e.into()))??;

    Ok(Redirect::to("/chat").into_response())
}

/// `POST /chat/restart`: replace the session and request a new greeting.
#[tracing::instrument(skip_all)]
pub async fn restart_session(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let key = chat_key(&session)
        .await?
        .ok_or_else(|| AppError::from(SessionError::NotStarted))?;

    let mut guard = match state.sessions.try_lock(&key) {
        None => return Err(SessionError::NotStarted.into()),
        Some(Err(_)) => return Err(SessionError::Busy.into()),
        Some(Ok(guard)) => guard,
    };

    if guard.restart().is_none() {
        return Err(SessionError::NotStarted.into());
    }
    spawn_start(guard);

    Ok(Redirect::to("/chat").into_response())
}
