#![allow(dead_code)]

use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use simulator_service::config::{AccessConfig, GenaiConfig, ProviderKind, SimulatorConfig};
use async_trait::async_trait;
use simulator_service::models::ChatTurn;
use simulator_service::services::providers::mock::MockTextProvider;
use simulator_service::services::providers::{
    GenerationParams, ProviderError, ProviderResponse, TextProvider,
};
use simulator_service::services::{MemoryTranscriptStore, ProviderRelay};
use simulator_service::startup::Application;
use std::sync::Arc;
use std::time::Duration;

pub const ACCESS_CODE: &str = "test-code";

pub fn test_config() -> SimulatorConfig {
    SimulatorConfig {
        common: CoreConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        genai: GenaiConfig {
            provider: ProviderKind::Mock,
            api_key: None,
            api_base: "http://127.0.0.1:9".to_string(),
            text_model: "mock-text".to_string(),
            temperature: 0.7,
            max_output_tokens: 2048,
        },
        mongodb: None,
        access: AccessConfig {
            code: Secret::new(ACCESS_CODE.to_string()),
            default_role_label: "Faculty member".to_string(),
            default_gender_label: "neutral".to_string(),
        },
        relay_rate_limit_per_minute: 100,
        session_idle_timeout: Duration::from_secs(3600),
        otlp_endpoint: None,
        log_level: "warn".to_string(),
    }
}

/// Mock provider that holds every turn open for a while.
pub struct SlowTextProvider {
    inner: MockTextProvider,
    delay: Duration,
}

#[async_trait]
impl TextProvider for SlowTextProvider {
    async fn generate(
        &self,
        history: &[ChatTurn],
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.generate(history, prompt, params).await
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: MemoryTranscriptStore,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: SimulatorConfig) -> Self {
        let store = MemoryTranscriptStore::new();
        let app = Application::build_with_sink(config, Arc::new(store.clone()))
            .await
            .expect("Failed to build test application");
        Self::serve(app, store).await
    }

    /// Spawn with a mock provider that takes `delay` to answer each turn.
    pub async fn spawn_slow(delay: Duration) -> Self {
        let store = MemoryTranscriptStore::new();
        let relay = ProviderRelay::new(
            Arc::new(SlowTextProvider {
                inner: MockTextProvider::new(true),
                delay,
            }),
            GenerationParams::default(),
        );
        let app = Application::build_with_parts(test_config(), relay, Arc::new(store.clone()))
            .await
            .expect("Failed to build test application");
        Self::serve(app, store).await
    }

    async fn serve(app: Application, store: MemoryTranscriptStore) -> Self {
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build client");

        // Wait for the server by polling the health endpoint
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            store,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn enter(&self, code: &str, name: &str) -> reqwest::Response {
        self.client
            .get(self.url("/"))
            .query(&[("code", code), ("name", name)])
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn send_message(&self, message: &str) -> reqwest::Response {
        self.client
            .post(self.url("/chat/messages"))
            .form(&[("message", message)])
            .send()
            .await
            .expect("Failed to send request")
    }
}
