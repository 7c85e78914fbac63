//! Core library for the forecast service
//!
//! This crate provides the orchestration around opaque forecasting engines:
//! - Static model registry and side-effect-free readiness probing
//! - Single-flight installation of optional heavy model dependencies
//! - Safe SQLite ingestion with row validation and precision inference
//! - Multi-model forecast dispatch with all-or-nothing failure semantics
//! - Health checks and observability

pub mod dispatch;
pub mod error;
pub mod health;
pub mod install;
pub mod models;
pub mod observability;
pub mod probe;
pub mod registry;
pub mod source;

pub use error::ForecastError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
