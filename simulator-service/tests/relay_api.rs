//! POST /api/chat.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{test_config, TestApp};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use simulator_service::config::ProviderKind;
use simulator_service::services::{
    DisabledTranscriptSink, HttpRelayClient, ProviderRelay, Relay, RelayError,
};
use simulator_service::startup::{build_relay, build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn post_chat(router: axum::Router, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn mock_router() -> axum::Router {
    let config = test_config();
    let relay = build_relay(&config).unwrap();
    build_router(AppState::new(config, relay, Arc::new(DisabledTranscriptSink)))
}

#[tokio::test]
async fn relay_returns_model_text() {
    let (status, body) = post_chat(
        mock_router(),
        json!({
            "messages": [
                {"role": "assistant", "content": "Hello, I am Alex"},
                {"role": "system", "content": "Connection restored"}
            ],
            "systemPrompt": "You are Alex.",
            "userMessage": "Call me Mari"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "**Mock** response for: Call me Mari");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn blank_user_message_is_a_bad_request() {
    let (status, body) = post_chat(
        mock_router(),
        json!({"messages": [], "systemPrompt": "You are Alex.", "userMessage": "   "}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User message is required");
}

#[tokio::test]
async fn missing_credential_is_a_server_error_with_details() {
    let mut config = test_config();
    config.genai.provider = ProviderKind::Gemini;
    config.genai.api_key = None;
    let relay = build_relay(&config).unwrap();
    assert!(!relay.is_configured());
    let router = build_router(AppState::new(config, relay, Arc::new(DisabledTranscriptSink)));

    let (status, body) = post_chat(
        router,
        json!({"messages": [], "systemPrompt": "S", "userMessage": "hello"}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn upstream_failure_is_a_server_error() {
    let config = test_config();
    let relay = ProviderRelay::new(
        Arc::new(simulator_service::services::providers::mock::MockTextProvider::new(false)),
        Default::default(),
    );
    let router = build_router(AppState::new(config, relay, Arc::new(DisabledTranscriptSink)));

    let (status, body) = post_chat(
        router,
        json!({"messages": [], "systemPrompt": "S", "userMessage": "hello"}),
    )
    .await;

    assert!(status.is_server_error());
    assert!(body["details"].is_string());
}

#[tokio::test]
async fn http_client_relays_through_a_running_service() {
    let app = TestApp::spawn().await;
    let client = HttpRelayClient::new(&app.address, Duration::from_secs(10)).unwrap();

    let reply = client.relay(&[], "You are Alex.", "hello").await.unwrap();
    assert_eq!(reply.message, "**Mock** response for: hello");

    let err = client.relay(&[], "You are Alex.", " ").await.unwrap_err();
    assert!(matches!(err, RelayError::EmptyMessage));
}

#[tokio::test]
async fn http_client_reports_rejections() {
    let mut config = test_config();
    config.genai.provider = ProviderKind::Gemini;
    let app = TestApp::spawn_with(config).await;
    let client = HttpRelayClient::new(&app.address, Duration::from_secs(10)).unwrap();

    let err = client.relay(&[], "S", "hello").await.unwrap_err();
    match err {
        RelayError::Rejected { status, .. } => assert_eq!(status, 500),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn relay_is_rate_limited_per_ip() {
    let mut config = test_config();
    config.relay_rate_limit_per_minute = 2;
    let app = TestApp::spawn_with(config).await;

    let body = json!({"messages": [], "systemPrompt": "S", "userMessage": "hi"});
    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = app
            .client
            .post(app.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .unwrap();
        statuses.push(response.status().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 429]);
}
