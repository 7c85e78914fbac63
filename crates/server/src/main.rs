//! Forecast Service - time-series forecasting API
//!
//! Orchestrates provisioning, ingestion and dispatch around opaque
//! Python forecasting engines.

use anyhow::Result;
use forecast_lib::{
    dispatch::{EngineSet, ForecastDispatcher},
    health::{components, HealthRegistry},
    install::{InstallLock, InstallManager, PipInstaller},
    probe::{PythonImportProbe, ReadinessProber},
    registry::ModelRegistry,
    ServiceMetrics, StructuredLogger,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting forecast-server");

    // Load configuration
    let config = config::ServiceConfig::load()?;
    info!(python = %config.python_bin, "Service configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::INSTALLER).await;
    health_registry.register(components::DATA_SOURCE).await;
    health_registry.register(components::ENGINES).await;

    // Initialize metrics and structured logger
    let metrics = ServiceMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(SERVICE_VERSION);

    // Wire the core: one registry, live prober, single-flight installer,
    // one Python engine per registered model.
    let registry = ModelRegistry::new();
    let prober = ReadinessProber::new(
        registry,
        Arc::new(PythonImportProbe::new(&config.python_bin)),
    );
    let installer = Arc::new(InstallManager::new(
        registry,
        prober.clone(),
        Arc::new(PipInstaller::new(&config.python_bin)),
        InstallLock::new(),
    ));
    let dispatcher = Arc::new(ForecastDispatcher::new(
        registry,
        EngineSet::python(&registry, &config.python_bin, &config.engine_module),
    ));

    // Create shared application state
    let app_state = Arc::new(api::AppState {
        health_registry: health_registry.clone(),
        metrics,
        logger: logger.clone(),
        prober,
        installer,
        dispatcher,
    });

    // Mark service as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
