use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use service_core::observability::REQUEST_ID_HEADER;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::{ProviderKind, SimulatorConfig};
use crate::handlers::{
    chat::{chat_page, index, restart_session, submit_message},
    health::{health_check, readiness_check},
    metrics::metrics,
    relay::chat_relay,
    status::system_status,
};
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::{GenerationParams, TextProvider};
use crate::services::{
    DisabledTranscriptSink, MongoTranscriptStore, ProviderRelay, SessionRegistry, TranscriptSink,
};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SimulatorConfig>,
    pub relay: Arc<ProviderRelay>,
    pub sink: Arc<dyn TranscriptSink>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(
        config: SimulatorConfig,
        relay: ProviderRelay,
        sink: Arc<dyn TranscriptSink>,
    ) -> Self {
        let sessions = SessionRegistry::new(config.session_idle_timeout);
        Self {
            config: Arc::new(config),
            relay: Arc::new(relay),
            sink,
            sessions,
        }
    }
}

/// Build the relay for the configured provider. A missing Gemini key leaves
/// the relay unconfigured rather than failing startup.
pub fn build_relay(config: &SimulatorConfig) -> Result<ProviderRelay, AppError> {
    let params = GenerationParams {
        temperature: config.genai.temperature,
        max_output_tokens: config.genai.max_output_tokens,
    };

    let provider: Arc<dyn TextProvider> = match config.genai.provider {
        ProviderKind::Mock => {
            tracing::info!("Using mock text provider");
            Arc::new(MockTextProvider::new(true))
        }
        ProviderKind::Gemini => {
            let Some(api_key) = config.genai.api_key.clone() else {
                tracing::warn!("GEMINI_API_KEY not set, chat replies are disabled");
                return Ok(ProviderRelay::unconfigured());
            };
            let provider = GeminiTextProvider::new(GeminiConfig {
                api_key,
                model: config.genai.text_model.clone(),
                base_url: config.genai.api_base.clone(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            tracing::info!(model = %config.genai.text_model, "Initialized Gemini text provider");
            Arc::new(provider)
        }
    };

    Ok(ProviderRelay::new(provider, params))
}

/// Connect the transcript store. Connection problems disable persistence
/// instead of stopping the service.
pub async fn build_sink(config: &SimulatorConfig) -> Arc<dyn TranscriptSink> {
    let Some(mongo) = &config.mongodb else {
        tracing::info!("MONGODB_URI not set, persistence disabled");
        return Arc::new(DisabledTranscriptSink);
    };

    let store = match MongoTranscriptStore::connect(
        mongo.uri.expose_secret(),
        &mongo.database,
        mongo.write_timeout,
    )
    .await
    {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("Persistence disabled: {}", e);
            return Arc::new(DisabledTranscriptSink);
        }
    };

    if let Err(e) = store.initialize_indexes().await {
        tracing::warn!("Continuing without indexes: {}", e);
    }

    Arc::new(store)
}

pub fn build_router(state: AppState) -> Router {
    let idle_secs = i64::try_from(state.sessions.idle_timeout().as_secs()).unwrap_or(i64::MAX);
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(idle_secs)));

    let limiter = create_ip_rate_limiter(state.config.relay_rate_limit_per_minute);

    let api_routes = Router::new()
        .route(
            "/api/chat",
            post(chat_relay).layer(from_fn_with_state(limiter, ip_rate_limit_middleware)),
        )
        .route("/api/status", get(system_status));

    Router::new()
        .route("/", get(index))
        .route("/chat", get(chat_page))
        .route("/chat/messages", post(submit_message))
        .route("/chat/restart", post(restart_session))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .merge(api_routes)
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    pub async fn build(config: SimulatorConfig) -> Result<Self, AppError> {
        let sink = build_sink(&config).await;
        Self::build_with_sink(config, sink).await
    }

    /// Build with an explicit transcript sink.
    pub async fn build_with_sink(
        config: SimulatorConfig,
        sink: Arc<dyn TranscriptSink>,
    ) -> Result<Self, AppError> {
        let relay = build_relay(&config)?;
        Self::build_with_parts(config, relay, sink).await
    }

    /// Build around an already constructed relay and sink.
    pub async fn build_with_parts(
        config: SimulatorConfig,
        relay: ProviderRelay,
        sink: Arc<dyn TranscriptSink>,
    ) -> Result<Self, AppError> {
        let address = config.common.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            model_configured = relay.is_configured(),
            persistence_enabled = sink.is_enabled(),
            "Simulator service ready"
        );

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, relay, sink),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let sweep_every = self
            .state
            .sessions
            .idle_timeout()
            .clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
        let sweeper = self.state.sessions.spawn_sweeper(sweep_every);
        let router = build_router(self.state);

        let served = axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            std::io::Error::other(format!("HTTP server error: {}", e))
        });

        sweeper.abort();
        served
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
