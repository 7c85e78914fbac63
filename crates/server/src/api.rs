//! HTTP API over the forecast core
//!
//! Thin axum layer: request-shape validation, error mapping, metrics and
//! health bookkeeping. All blocking core calls (probes, installs, SQLite
//! reads, engine subprocesses) run under `spawn_blocking`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use forecast_lib::{
    dispatch::ForecastDispatcher,
    health::{components, ComponentStatus, HealthRegistry},
    install::InstallManager,
    models::{is_strict_date, InstallOutcome, TimeSeriesRow, MAX_PERIODS, MIN_ROWS},
    probe::ReadinessProber,
    source::{self, SourceQuery},
    ForecastError, ForecastPayloads, IngestionResult, ServiceMetrics, StructuredLogger,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    pub prober: ReadinessProber,
    pub installer: Arc<InstallManager>,
    pub dispatcher: Arc<ForecastDispatcher>,
}

/// API-level error: a status code plus a `detail` body, the shape every
/// non-2xx response uses.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        let status = if err.is_client_fault() {
            StatusCode::BAD_REQUEST
        } else if matches!(err, ForecastError::Busy) {
            StatusCode::CONFLICT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ApiError::internal(format!("blocking task failed: {err}")))
}

/// Health check - 200 while at least degraded, 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

/// Readiness check - 200 once startup completed and no component failed
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Live readiness of every registered model. Probed fresh on every call.
async fn models_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, bool>>, ApiError> {
    let prober = state.prober.clone();
    let status = run_blocking(move || prober.status_all()).await?;

    for (model, ready) in &status {
        state.metrics.set_model_ready(model, *ready);
    }
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct InstallRequest {
    pub model: String,
}

async fn install_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InstallRequest>,
) -> Result<Json<InstallOutcome>, ApiError> {
    if request.model.trim().is_empty() {
        return Err(ApiError::bad_request("model must not be empty"));
    }

    let installer = state.installer.clone();
    let model = request.model.clone();
    let started = Instant::now();
    let result = run_blocking(move || installer.install(&model)).await?;
    state
        .metrics
        .observe_install_duration(started.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => {
            state.metrics.inc_installs();
            state
                .logger
                .log_install_outcome(&outcome.model, outcome.installed, &outcome.detail);
            state.health_registry.set_healthy(components::INSTALLER).await;
            Ok(Json(outcome))
        }
        Err(err) => {
            if matches!(
                err,
                ForecastError::InstallationFailed(_) | ForecastError::VerificationFailed
            ) {
                state.metrics.inc_install_failures();
                state
                    .logger
                    .log_install_failure(&request.model, &err.to_string());
            }
            Err(err.into())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SqliteSourceRequest {
    pub db_path: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default)]
    pub value_column: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

async fn ingest_sqlite(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SqliteSourceRequest>,
) -> Result<Json<IngestionResult>, ApiError> {
    if request.db_path.trim().is_empty() {
        return Err(ApiError::bad_request("db_path must not be empty"));
    }

    let db_path = request.db_path.clone();
    let query = SourceQuery {
        table: request.table,
        date_column: request.date_column,
        value_column: request.value_column,
        sql: request.sql,
        start_date: request.start_date,
        end_date: request.end_date,
        limit: request.limit,
    };

    let started = Instant::now();
    let result = run_blocking(move || source::ingest(&db_path, &query)).await?;
    state
        .metrics
        .observe_ingest_latency(started.elapsed().as_secs_f64());

    match result {
        Ok(ingestion) => {
            state.metrics.set_rows_ingested(ingestion.valid_count as i64);
            state
                .health_registry
                .set_healthy(components::DATA_SOURCE)
                .await;
            info!(
                total_rows = ingestion.total_scanned,
                valid_rows = ingestion.valid_count,
                "data source ingested"
            );
            Ok(Json(ingestion))
        }
        Err(err) => {
            if let ForecastError::DatabaseReadFailed(detail) = &err {
                state.metrics.inc_ingest_failures();
                state
                    .health_registry
                    .set_degraded(components::DATA_SOURCE, detail.clone())
                    .await;
            }
            Err(err.into())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectionTestRequest {
    pub db_path: String,
}

async fn test_sqlite(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConnectionTestRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.db_path.trim().is_empty() {
        return Err(ApiError::bad_request("db_path must not be empty"));
    }

    let db_path = request.db_path.clone();
    run_blocking(move || source::test_connection(&db_path)).await??;

    state
        .health_registry
        .set_healthy(components::DATA_SOURCE)
        .await;
    Ok(Json(serde_json::json!({
        "ok": true,
        "detail": "connection successful"
    })))
}

fn default_periods() -> u32 {
    30
}

fn default_models() -> Vec<String> {
    vec!["prophet".to_string()]
}

#[derive(Debug, Deserialize)]
pub struct ForecastApiRequest {
    pub rows: Vec<TimeSeriesRow>,
    #[serde(default = "default_periods")]
    pub periods: u32,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

async fn forecast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForecastApiRequest>,
) -> Result<Json<ForecastPayloads>, ApiError> {
    if request.rows.len() < MIN_ROWS {
        return Err(ForecastError::InsufficientData(request.rows.len()).into());
    }
    if request
        .rows
        .iter()
        .any(|row| !is_strict_date(&row.date) || !row.value.is_finite())
    {
        return Err(ApiError::bad_request(
            "rows must contain YYYY-MM-DD dates and finite values",
        ));
    }
    if request.periods < 1 || request.periods > MAX_PERIODS {
        return Err(ApiError::bad_request(
            "periods must be an integer between 1 and 365",
        ));
    }
    if request.models.is_empty() {
        return Err(ApiError::bad_request("models must not be empty"));
    }

    // Engines expect the series in ascending date order.
    let mut rows = request.rows;
    rows.sort_by(|a, b| a.date.cmp(&b.date));
    let row_count = rows.len();

    let dispatcher = state.dispatcher.clone();
    let models = request.models.clone();
    let periods = request.periods;
    let started = Instant::now();
    let result = run_blocking(move || dispatcher.forecast(&rows, periods, &models)).await?;
    state
        .metrics
        .observe_forecast_latency(started.elapsed().as_secs_f64());

    match result {
        Ok(payloads) => {
            state.metrics.inc_forecasts();
            state
                .logger
                .log_forecast(&request.models, row_count, request.periods);
            Ok(Json(payloads))
        }
        Err(err) => {
            if matches!(err, ForecastError::ForecastEngineFailed { .. }) {
                state.metrics.inc_engine_failures();
            }
            Err(err.into())
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/models/status", get(models_status))
        .route("/models/install", post(install_model))
        .route("/datasource/sqlite", post(ingest_sqlite))
        .route("/datasource/sqlite/test", post(test_sqlite))
        .route("/forecast", post(forecast))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
