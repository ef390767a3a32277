//! Browser flow: access gate, greeting, turns and restart.

mod common;

use common::{TestApp, ACCESS_CODE};
use simulator_service::conversation::{Phase, OPENING_MESSAGE};
use std::time::Duration;

#[tokio::test]
async fn wrong_code_is_denied_and_starts_nothing() {
    let app = TestApp::spawn().await;

    let response = app.enter("wrong", "Mariana").await;
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    assert!(response.text().await.unwrap().contains("Access denied"));
    assert!(app.store.sessions().is_empty());
}

#[tokio::test]
async fn missing_name_is_denied() {
    let app = TestApp::spawn().await;

    let response = app.enter(ACCESS_CODE, "  ").await;
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn chat_page_without_session_redirects_to_gate() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/chat")).send().await.unwrap();
    // Followed to the gate, which denies an empty request.
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admitted_participant_gets_greeting_and_advances() {
    let app = TestApp::spawn().await;

    let response = app.enter(ACCESS_CODE, "Mariana").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let page = response.text().await.unwrap();
    assert!(page.contains("Hello, Mariana"));
    assert!(page.contains("Step 1 of 5"));
    assert!(page.contains("Mock response for: start conversation"));
    assert!(!page.contains("**Mock**"));

    let response = app.send_message("Call me Mari").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let page = response.text().await.unwrap();
    assert!(page.contains("Step 2 of 5"));
    assert!(page.contains("Mock response for: Call me Mari"));

    assert_eq!(app.store.sessions().len(), 1);
    let interactions = app.store.interactions();
    assert_eq!(interactions.len(), 2);
    assert_eq!(interactions[0].user_message, OPENING_MESSAGE);
    assert_eq!(interactions[0].phase, Phase::Greeting);
    assert_eq!(interactions[1].phase, Phase::Concepts);
    assert_eq!(interactions[1].turn_number, 2);
    assert_eq!(interactions[1].session_id, interactions[0].session_id);
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let app = TestApp::spawn().await;
    app.enter(ACCESS_CODE, "Mariana").await;

    let response = app.send_message("   ").await;
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restart_opens_a_new_session() {
    let app = TestApp::spawn().await;
    app.enter(ACCESS_CODE, "Mariana").await;
    app.send_message("Call me Mari").await;

    let response = app
        .client
        .post(app.url("/chat/restart"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let page = response.text().await.unwrap();
    assert!(page.contains("Step 1 of 5"));
    assert!(!page.contains("Call me Mari"));

    assert_eq!(app.store.sessions().len(), 2);
}

#[tokio::test]
async fn role_and_gender_can_be_overridden() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/"))
        .query(&[
            ("code", ACCESS_CODE),
            ("name", "Mariana"),
            ("role", "Thesis Advisor"),
            ("gender", "femenino"),
        ])
        .send()
        .await
        .unwrap();

    assert!(response.text().await.unwrap().contains("Thesis Advisor"));
}

#[tokio::test]
async fn second_submission_during_a_turn_is_refused() {
    let app = TestApp::spawn_slow(Duration::from_millis(600)).await;
    let response = app.enter(ACCESS_CODE, "Mariana").await;
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let (first, second) = tokio::join!(app.send_message("Call me Mari"), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        app.send_message("Are you there?").await
    });

    assert_eq!(first.status(), reqwest::StatusCode::OK);
    assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);

    let page = app.client.get(app.url("/chat")).send().await.unwrap();
    let page = page.text().await.unwrap();
    assert!(page.contains("Call me Mari"));
    assert!(!page.contains("Are you there?"));
    assert_eq!(app.store.interactions().len(), 2);
}

#[tokio::test]
async fn reentering_the_gate_during_a_turn_is_refused() {
    let app = TestApp::spawn_slow(Duration::from_millis(600)).await;
    app.enter(ACCESS_CODE, "Mariana").await;

    let (turn, reentry) = tokio::join!(app.send_message("Call me Mari"), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        app.enter(ACCESS_CODE, "Mariana").await
    });

    assert_eq!(turn.status(), reqwest::StatusCode::OK);
    assert_eq!(reentry.status(), reqwest::StatusCode::CONFLICT);

    let page = app.client.get(app.url("/chat")).send().await.unwrap();
    assert!(page.text().await.unwrap().contains("Step 2 of 5"));
    assert_eq!(app.store.sessions().len(), 1);
}

#[tokio::test]
async fn abandoned_sessions_are_evicted_after_idle_timeout() {
    let mut config = common::test_config();
    config.session_idle_timeout = Duration::from_secs(1);
    let app = TestApp::spawn_with(config).await;

    for _ in 0..5 {
        // A fresh client per visit, so every visitor gets a new browser session.
        reqwest::Client::new()
            .get(app.url("/"))
            .query(&[("code", ACCESS_CODE), ("name", "Mariana")])
            .send()
            .await
            .unwrap();
    }

    let active = |status: serde_json::Value| status["activeSessions"].as_u64().unwrap();
    let status = app.client.get(app.url("/api/status")).send().await.unwrap();
    assert_eq!(active(status.json().await.unwrap()), 5);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let status = app.client.get(app.url("/api/status")).send().await.unwrap();
    assert_eq!(active(status.json().await.unwrap()), 0);
}
