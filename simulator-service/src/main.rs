use dotenvy::dotenv;
use simulator_service::config::SimulatorConfig;
use simulator_service::services::metrics::init_metrics;
use simulator_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = SimulatorConfig::load().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "simulator-service",
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    if let Err(e) = init_metrics() {
        tracing::warn!("HTTP metrics unavailable: {}", e);
    }

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    tracing::info!("Starting simulator-service on port {}", app.port());
    app.run_until_stopped().await?;

    tracing::info!("simulator-service stopped");
    Ok(())
}
