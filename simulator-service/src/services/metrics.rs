//! Prometheus metrics for simulator-service.
//!
//! HTTP request metrics come from the `metrics` recorder installed by
//! [`init_metrics`]; conversation metrics live in a custom registry.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;
use std::time::Duration;

use crate::conversation::Phase;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

static SIMULATOR_METRICS: OnceLock<SimulatorMetrics> = OnceLock::new();

struct SimulatorMetrics {
    registry: Registry,
    relay_requests_total: IntCounterVec,
    relay_latency_seconds: HistogramVec,
    phase_transitions_total: IntCounterVec,
    persistence_failures_total: IntCounterVec,
}

impl SimulatorMetrics {
    fn build() -> Self {
        let registry = Registry::new();

        let relay_requests_total = IntCounterVec::new(
            Opts::new(
                "simulator_relay_requests_total",
                "Relay calls by model and outcome",
            ),
            &["model", "outcome"],
        )
        .expect("Failed to create simulator_relay_requests_total metric");

        let relay_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "simulator_relay_latency_seconds",
                "Relay call latency in seconds",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["model"],
        )
        .expect("Failed to create simulator_relay_latency_seconds metric");

        let phase_transitions_total = IntCounterVec::new(
            Opts::new(
                "simulator_phase_transitions_total",
                "Committed phase changes by source and target phase",
            ),
            &["from", "to"],
        )
        .expect("Failed to create simulator_phase_transitions_total metric");

        let persistence_failures_total = IntCounterVec::new(
            Opts::new(
                "simulator_persistence_failures_total",
                "Dropped transcript writes by operation",
            ),
            &["operation"],
        )
        .expect("Failed to create simulator_persistence_failures_total metric");

        registry
            .register(Box::new(relay_requests_total.clone()))
            .expect("Failed to register simulator_relay_requests_total");
        registry
            .register(Box::new(relay_latency_seconds.clone()))
            .expect("Failed to register simulator_relay_latency_seconds");
        registry
            .register(Box::new(phase_transitions_total.clone()))
            .expect("Failed to register simulator_phase_transitions_total");
        registry
            .register(Box::new(persistence_failures_total.clone()))
            .expect("Failed to register simulator_persistence_failures_total");

        Self {
            registry,
            relay_requests_total,
            relay_latency_seconds,
            phase_transitions_total,
            persistence_failures_total,
        }
    }
}

fn simulator_metrics() -> &'static SimulatorMetrics {
    SIMULATOR_METRICS.get_or_init(SimulatorMetrics::build)
}

/// Install the global HTTP metrics recorder. Call once from `main`.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    if METRICS_HANDLE.set(handle).is_err() {
        anyhow::bail!("metrics recorder already initialized");
    }

    simulator_metrics();
    Ok(())
}

/// Get metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let metric_families = simulator_metrics().registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).ok();
    if let Ok(custom_metrics) = String::from_utf8(buffer) {
        output.push_str(&custom_metrics);
    }

    output
}

pub fn record_relay(model: &str, outcome: &str, latency: Duration) {
    let metrics = simulator_metrics();
    metrics
        .relay_requests_total
        .with_label_values(&[model, outcome])
        .inc();
    metrics
        .relay_latency_seconds
        .with_label_values(&[model])
        .observe(latency.as_secs_f64());
}

pub fn record_phase_transition(from: Phase, to: Phase) {
    simulator_metrics()
        .phase_transitions_total
        .with_label_values(&[&from.to_string(), &to.to_string()])
        .inc();
}

pub fn record_persistence_failure(operation: &str) {
    simulator_metrics()
        .persistence_failures_total
        .with_label_values(&[operation])
        .inc();
}
