//! Observability infrastructure for the forecast service
//!
//! Provides:
//! - Prometheus metrics (install duration, forecast latency, ingestion
//!   volume, error counters, model readiness info)
//! - Structured event logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for request-scale latencies (in seconds). Installs can
/// run for minutes, hence the long tail.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0,
];

/// Global metrics instance (registered once per process).
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    install_duration_seconds: Histogram,
    forecast_latency_seconds: Histogram,
    ingest_latency_seconds: Histogram,
    rows_ingested: IntGauge,
    installs_total: IntCounter,
    install_failures_total: IntCounter,
    forecasts_total: IntCounter,
    engine_failures_total: IntCounter,
    ingest_failures_total: IntCounter,
    model_ready_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            install_duration_seconds: register_histogram!(
                "forecast_service_install_duration_seconds",
                "Time spent provisioning model dependencies",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register install_duration_seconds"),

            forecast_latency_seconds: register_histogram!(
                "forecast_service_forecast_latency_seconds",
                "Time spent dispatching a multi-model forecast request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_latency_seconds"),

            ingest_latency_seconds: register_histogram!(
                "forecast_service_ingest_latency_seconds",
                "Time spent reading and validating a data source",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register ingest_latency_seconds"),

            rows_ingested: register_int_gauge!(
                "forecast_service_rows_ingested",
                "Valid rows produced by the most recent ingestion"
            )
            .expect("Failed to register rows_ingested"),

            installs_total: register_int_counter!(
                "forecast_service_installs_total",
                "Completed model installations"
            )
            .expect("Failed to register installs_total"),

            install_failures_total: register_int_counter!(
                "forecast_service_install_failures_total",
                "Model installations that failed or could not be verified"
            )
            .expect("Failed to register install_failures_total"),

            forecasts_total: register_int_counter!(
                "forecast_service_forecasts_total",
                "Forecast requests answered successfully"
            )
            .expect("Failed to register forecasts_total"),

            engine_failures_total: register_int_counter!(
                "forecast_service_engine_failures_total",
                "Forecast requests aborted by an engine failure"
            )
            .expect("Failed to register engine_failures_total"),

            ingest_failures_total: register_int_counter!(
                "forecast_service_ingest_failures_total",
                "Data source reads that failed at the driver level"
            )
            .expect("Failed to register ingest_failures_total"),

            model_ready_info: register_gauge_vec!(
                "forecast_service_model_ready_info",
                "Readiness of each registered model as last probed",
                &["model"]
            )
            .expect("Failed to register model_ready_info"),
        }
    }
}

/// Cloneable handle over the process-global metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_install_duration(&self, duration_secs: f64) {
        self.inner().install_duration_seconds.observe(duration_secs);
    }

    pub fn observe_forecast_latency(&self, duration_secs: f64) {
        self.inner().forecast_latency_seconds.observe(duration_secs);
    }

    pub fn observe_ingest_latency(&self, duration_secs: f64) {
        self.inner().ingest_latency_seconds.observe(duration_secs);
    }

    pub fn set_rows_ingested(&self, rows: i64) {
        self.inner().rows_ingested.set(rows);
    }

    pub fn inc_installs(&self) {
        self.inner().installs_total.inc();
    }

    pub fn inc_install_failures(&self) {
        self.inner().install_failures_total.inc();
    }

    pub fn inc_forecasts(&self) {
        self.inner().forecasts_total.inc();
    }

    pub fn inc_engine_failures(&self) {
        self.inner().engine_failures_total.inc();
    }

    pub fn inc_ingest_failures(&self) {
        self.inner().ingest_failures_total.inc();
    }

    /// Record the last probed readiness of a model.
    pub fn set_model_ready(&self, model: &str, ready: bool) {
        self.inner()
            .model_ready_info
            .with_label_values(&[model])
            .set(if ready { 1.0 } else { 0.0 });
    }
}

/// Structured logger for service lifecycle and provisioning events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            "Forecast service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_stopped",
            instance = %self.instance,
            reason = %reason,
            "Forecast service shutting down"
        );
    }

    pub fn log_install_outcome(&self, model: &str, installed: bool, detail: &str) {
        info!(
            event = "model_install",
            instance = %self.instance,
            model = %model,
            installed = installed,
            detail = %detail,
            "Model installation finished"
        );
    }

    pub fn log_install_failure(&self, model: &str, detail: &str) {
        warn!(
            event = "model_install_failed",
            instance = %self.instance,
            model = %model,
            detail = %detail,
            "Model installation failed"
        );
    }

    pub fn log_forecast(&self, models: &[String], rows: usize, periods: u32) {
        info!(
            event = "forecast_dispatched",
            instance = %self.instance,
            models = ?models,
            rows = rows,
            periods = periods,
            "Forecast request completed"
        );
    }
}
