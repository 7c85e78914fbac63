//! Core data models for the forecast service

use serde::{Deserialize, Serialize};

/// Minimum number of validated rows a series must have before it can be
/// ingested or forecast.
pub const MIN_ROWS: usize = 3;

/// Largest forecast horizon a request may ask for, in periods.
pub const MAX_PERIODS: u32 = 365;

/// One observation of the series: a strict `YYYY-MM-DD` date and a finite
/// value. Rows are only constructed after validation; invalid source rows
/// are dropped, never repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    pub date: String,
    pub value: f64,
}

/// Outcome of reading and validating a data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    pub rows: Vec<TimeSeriesRow>,
    /// Rows read from the source before filtering.
    #[serde(rename = "total_rows")]
    pub total_scanned: usize,
    /// Rows that survived validation.
    #[serde(rename = "valid_rows")]
    pub valid_count: usize,
    /// Max fractional-digit count observed among accepted values, with
    /// trailing zeros stripped. Informational, used for presentation only.
    #[serde(rename = "precision")]
    pub inferred_precision: u32,
}

/// Outcome of one installation attempt, in the API response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub ok: bool,
    pub model: String,
    pub installed: bool,
    pub detail: String,
}

impl InstallOutcome {
    pub fn already_installed(model: &str) -> Self {
        Self {
            ok: true,
            model: model.to_string(),
            installed: true,
            detail: "already installed".to_string(),
        }
    }

    pub fn installed(model: &str) -> Self {
        Self {
            ok: true,
            model: model.to_string(),
            installed: true,
            detail: "installed".to_string(),
        }
    }
}

/// Ordered mapping of model id to its opaque forecast payload.
pub type ForecastPayloads = serde_json::Map<String, serde_json::Value>;

/// Lowercase, trimmed form of a model identifier, used as the registry key.
pub fn canonical_model_id(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Exact `YYYY-MM-DD` shape check: four digits, dash, two digits, dash,
/// two digits, nothing else.
pub fn is_strict_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    [0, 1, 2, 3, 5, 6, 8, 9]
        .iter()
        .all(|&i| bytes[i].is_ascii_digit())
}
