//! Integration tests for the forecast API endpoints
//!
//! The full router is exercised through `tower::ServiceExt::oneshot` with
//! fake probes, installers and engines, so no test ever shells out.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use forecast_lib::{
    dispatch::{EngineSet, ForecastDispatcher, ForecastEngine},
    error::ForecastError,
    health::{components, ComponentStatus, HealthRegistry},
    install::{InstallLock, InstallManager, InstallerOutput, PackageInstaller},
    models::{is_strict_date, TimeSeriesRow, MAX_PERIODS, MIN_ROWS},
    probe::{ImportProbe, ReadinessProber},
    registry::ModelRegistry,
    source::{self, SourceQuery},
    ServiceMetrics, StructuredLogger,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// The handlers under test live in the binary crate; rebuild the same router
// shape against lib state so the endpoints can be exercised in-process.

#[derive(Clone)]
struct AppState {
    health_registry: HealthRegistry,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
    prober: ReadinessProber,
    installer: Arc<InstallManager>,
    dispatcher: Arc<ForecastDispatcher>,
}

struct ApiError {
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
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn models_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.prober.status_all())
}

#[derive(serde::Deserialize)]
struct InstallRequest {
    model: String,
}

async fn install_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InstallRequest>,
) -> Result<Json<forecast_lib::InstallOutcome>, ApiError> {
    if request.model.trim().is_empty() {
        return Err(ApiError::bad_request("model must not be empty"));
    }
    let outcome = state.installer.install(&request.model)?;
    state.metrics.inc_installs();
    state
        .logger
        .log_install_outcome(&outcome.model, outcome.installed, &outcome.detail);
    Ok(Json(outcome))
}

#[derive(serde::Deserialize)]
struct SqliteSourceRequest {
    db_path: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    date_column: Option<String>,
    #[serde(default)]
    value_column: Option<String>,
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

async fn ingest_sqlite(
    Json(request): Json<SqliteSourceRequest>,
) -> Result<Json<forecast_lib::IngestionResult>, ApiError> {
    if request.db_path.trim().is_empty() {
        return Err(ApiError::bad_request("db_path must not be empty"));
    }
    let query = SourceQuery {
        table: request.table,
        date_column: request.date_column,
        value_column: request.value_column,
        sql: request.sql,
        start_date: request.start_date,
        end_date: request.end_date,
        limit: request.limit,
    };
    Ok(Json(source::ingest(&request.db_path, &query)?))
}

#[derive(serde::Deserialize)]
struct ForecastApiRequest {
    rows: Vec<TimeSeriesRow>,
    periods: u32,
    models: Vec<String>,
}

async fn forecast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForecastApiRequest>,
) -> Result<Json<forecast_lib::ForecastPayloads>, ApiError> {
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
    let mut rows = request.rows;
    rows.sort_by(|a, b| a.date.cmp(&b.date));
    let payloads = state
        .dispatcher
        .forecast(&rows, request.periods, &request.models)?;
    Ok(Json(payloads))
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/models/status", get(models_status))
        .route("/models/install", post(install_model))
        .route("/datasource/sqlite", post(ingest_sqlite))
        .route("/forecast", post(forecast))
        .with_state(state)
}

struct FakeProbe {
    available: Vec<&'static str>,
}

impl ImportProbe for FakeProbe {
    fn modules_exist(&self, modules: &[&str]) -> bool {
        modules.iter().all(|m| self.available.contains(m))
    }
}

struct FakeInstaller {
    invocations: AtomicUsize,
}

impl PackageInstaller for FakeInstaller {
    fn install(&self, _specs: &[&str]) -> Result<InstallerOutput, ForecastError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(InstallerOutput {
            success: true,
            diagnostics: String::new(),
        })
    }
}

#[derive(Default)]
struct RecordingEngine {
    fails: bool,
    seen_rows: Mutex<Vec<Vec<TimeSeriesRow>>>,
}

impl ForecastEngine for RecordingEngine {
    fn forecast(&self, rows: &[TimeSeriesRow], periods: u32) -> Result<serde_json::Value, String> {
        self.seen_rows.lock().unwrap().push(rows.to_vec());
        if self.fails {
            return Err("engine exploded".to_string());
        }
        Ok(json!({ "periods": periods }))
    }
}

struct TestHarness {
    state: Arc<AppState>,
    lock: InstallLock,
    installer: Arc<FakeInstaller>,
    prophet_engine: Arc<RecordingEngine>,
}

fn setup_test_app(installed_modules: Vec<&'static str>, holtwinters_fails: bool) -> (Router, TestHarness) {
    let registry = ModelRegistry::new();
    let prober = ReadinessProber::new(
        registry,
        Arc::new(FakeProbe {
            available: installed_modules,
        }),
    );

    let lock = InstallLock::new();
    let installer = Arc::new(FakeInstaller {
        invocations: AtomicUsize::new(0),
    });
    let install_manager = Arc::new(InstallManager::new(
        registry,
        prober.clone(),
        installer.clone(),
        lock.clone(),
    ));

    let prophet_engine = Arc::new(RecordingEngine::default());
    let holtwinters_engine = Arc::new(RecordingEngine {
        fails: holtwinters_fails,
        seen_rows: Mutex::new(Vec::new()),
    });
    let engines = EngineSet::new()
        .with_engine("prophet", prophet_engine.clone())
        .with_engine("holtwinters", holtwinters_engine);
    let dispatcher = Arc::new(ForecastDispatcher::new(registry, engines));

    let state = Arc::new(AppState {
        health_registry: HealthRegistry::new(),
        metrics: ServiceMetrics::new(),
        logger: StructuredLogger::new("test-instance"),
        prober,
        installer: install_manager,
        dispatcher,
    });
    let router = create_test_router(state.clone());

    (
        router,
        TestHarness {
            state,
            lock,
            installer,
            prophet_engine,
        },
    )
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_models_status_reports_every_registered_model() {
    let (app, _harness) = setup_test_app(vec!["prophet", "statsmodels"], false);

    let response = app.oneshot(get_request("/models/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = json_body(response).await;
    assert_eq!(status["prophet"], true);
    assert_eq!(status["holtwinters"], true);
    assert_eq!(status["neuralprophet"], false);
}

#[tokio::test]
async fn test_install_is_idempotent_for_installed_models() {
    let (app, harness) = setup_test_app(vec!["prophet"], false);

    let response = app
        .oneshot(post_json("/models/install", json!({ "model": "prophet" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let outcome = json_body(response).await;
    assert_eq!(outcome["ok"], true);
    assert_eq!(outcome["installed"], true);
    assert_eq!(outcome["detail"], "already installed");
    assert_eq!(harness.installer.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_install_returns_conflict_while_another_is_in_flight() {
    let (app, harness) = setup_test_app(vec![], false);

    // Simulate an in-flight install of some other model.
    let _guard = harness.lock.try_acquire().unwrap();

    let response = app
        .oneshot(post_json("/models/install", json!({ "model": "prophet" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(harness.installer.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_install_of_unknown_model_is_a_client_error() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json("/models/install", json!({ "model": "sarima" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("sarima"));
    assert_eq!(harness.installer.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_install_rejects_an_empty_model_id() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json("/models/install", json!({ "model": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.installer.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ingest_rejects_an_empty_db_path() {
    let (app, _harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json(
            "/datasource/sqlite",
            json!({ "db_path": "", "table": "daily_sales" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("db_path"));
}

#[tokio::test]
async fn test_ingest_reads_a_real_database() {
    let (app, _harness) = setup_test_app(vec![], false);

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("series.db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        "CREATE TABLE daily_sales (date TEXT, value REAL);
         INSERT INTO daily_sales VALUES
            ('2024-01-01', 1.5), ('2024-01-02', 2.0), ('2024-01-03', 3.25);",
    )
    .unwrap();

    let response = app
        .oneshot(post_json(
            "/datasource/sqlite",
            json!({
                "db_path": db_path.to_string_lossy(),
                "table": "daily_sales"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["total_rows"], 3);
    assert_eq!(body["valid_rows"], 3);
    assert_eq!(body["precision"], 2);
}

fn three_rows() -> serde_json::Value {
    json!([
        { "date": "2024-01-03", "value": 3.0 },
        { "date": "2024-01-01", "value": 1.0 },
        { "date": "2024-01-02", "value": 2.0 }
    ])
}

#[tokio::test]
async fn test_forecast_with_unknown_model_invokes_no_engine() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json(
            "/forecast",
            json!({ "rows": three_rows(), "periods": 30, "models": ["unknownmodel"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("unknownmodel"));
    assert!(harness.prophet_engine.seen_rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_forecast_rejects_too_few_rows_at_intake() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json(
            "/forecast",
            json!({
                "rows": [
                    { "date": "2024-01-01", "value": 1.0 },
                    { "date": "2024-01-02", "value": 2.0 }
                ],
                "periods": 30,
                "models": ["prophet"]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("at least 3"));
    assert!(harness.prophet_engine.seen_rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_forecast_rejects_malformed_rows() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json(
            "/forecast",
            json!({
                "rows": [
                    { "date": "2024-1-01", "value": 1.0 },
                    { "date": "2024-01-02", "value": 2.0 },
                    { "date": "2024-01-03", "value": 3.0 }
                ],
                "periods": 30,
                "models": ["prophet"]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.prophet_engine.seen_rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_forecast_rejects_out_of_range_periods() {
    let (app, harness) = setup_test_app(vec![], false);

    for periods in [0, 366] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/forecast",
                json!({ "rows": three_rows(), "periods": periods, "models": ["prophet"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    assert!(harness.prophet_engine.seen_rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_forecast_rejects_an_empty_model_list() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json(
            "/forecast",
            json!({ "rows": three_rows(), "periods": 30, "models": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("models"));
    assert!(harness.prophet_engine.seen_rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_forecast_sorts_rows_before_dispatch() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .oneshot(post_json(
            "/forecast",
            json!({ "rows": three_rows(), "periods": 14, "models": ["prophet"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["prophet"]["periods"], 14);

    let seen = harness.prophet_engine.seen_rows.lock().unwrap();
    let dates: Vec<_> = seen[0].iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, ["2024-01-01", "2024-01-02", "2024-01-03"]);
}

#[tokio::test]
async fn test_forecast_engine_failure_yields_no_partial_result() {
    let (app, harness) = setup_test_app(vec![], true);

    let response = app
        .oneshot(post_json(
            "/forecast",
            json!({ "rows": three_rows(), "periods": 30, "models": ["prophet", "holtwinters"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The whole request failed as one aggregate error; prophet ran but its
    // result must not appear anywhere in the response.
    let body = json_body(response).await;
    assert!(body.get("prophet").is_none());
    assert!(body["detail"].as_str().unwrap().contains("holtwinters"));
    assert_eq!(harness.prophet_engine.seen_rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_healthz_reflects_component_state() {
    let (app, harness) = setup_test_app(vec![], false);
    harness
        .state
        .health_registry
        .register(components::ENGINES)
        .await;

    let response = app.oneshot(get_request("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = json_body(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["engines"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, harness) = setup_test_app(vec![], false);
    harness
        .state
        .health_registry
        .set_unhealthy(components::ENGINES, "runner missing")
        .await;

    let response = app.oneshot(get_request("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_transitions_with_ready_flag() {
    let (app, harness) = setup_test_app(vec![], false);

    let response = app
        .clone()
        .oneshot(get_request("/readyz"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    harness.state.health_registry.set_ready(true).await;
    let response = app.oneshot(get_request("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
