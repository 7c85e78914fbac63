//! SQLite data-source ingestion
//!
//! Builds safe read-only queries (raw or structured mode), reads raw
//! (date, value) pairs, then filters them into a validated time series with
//! an inferred display precision.

mod query;
mod validate;

pub use query::{build_plan, read_rows, QueryPlan, RawRow, SourceQuery, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT};
pub use validate::validate_rows;

use crate::error::ForecastError;
use crate::models::IngestionResult;

/// Constant probe query used to verify that a database file is reachable.
pub const CONNECTION_PROBE_SQL: &str = "SELECT date('now') AS date, 1 AS value";

/// Full ingestion path: plan, read, validate.
pub fn ingest(db_path: &str, request: &SourceQuery) -> Result<IngestionResult, ForecastError> {
    let plan = build_plan(request)?;
    let raw = read_rows(db_path, &plan)?;
    validate_rows(&raw)
}

/// Connection test: runs the constant probe query through the raw path and
/// reports only whether the read succeeded.
pub fn test_connection(db_path: &str) -> Result<(), ForecastError> {
    let request = SourceQuery {
        sql: Some(CONNECTION_PROBE_SQL.to_string()),
        limit: Some(1),
        ..SourceQuery::default()
    };
    let plan = build_plan(&request)?;
    read_rows(db_path, &plan)?;
    Ok(())
}
