//! Data ingestion and forecast commands

use crate::client::{
    ApiClient, ForecastPayloads, ForecastRequest, IngestionResult, SqliteSourceRequest,
    TimeSeriesRow,
};
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct IngestSummaryRow {
    #[tabled(rename = "SCANNED")]
    scanned: usize,
    #[tabled(rename = "VALID")]
    valid: usize,
    #[tabled(rename = "DROPPED")]
    dropped: usize,
    #[tabled(rename = "PRECISION")]
    precision: u32,
    #[tabled(rename = "FIRST")]
    first: String,
    #[tabled(rename = "LAST")]
    last: String,
}

/// Read a data source through the service and summarize the result
pub async fn ingest(
    client: &ApiClient,
    request: &SqliteSourceRequest,
    format: OutputFormat,
) -> Result<()> {
    let result: IngestionResult = client.post("/datasource/sqlite", request).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "total_rows": result.total_rows,
                "valid_rows": result.valid_rows,
                "precision": result.precision,
                "rows": result.rows,
            }))?);
        }
        OutputFormat::Table => {
            let summary = IngestSummaryRow {
                scanned: result.total_rows,
                valid: result.valid_rows,
                dropped: result.total_rows - result.valid_rows,
                precision: result.precision,
                first: result
                    .rows
                    .first()
                    .map(|r| r.date.clone())
                    .unwrap_or_default(),
                last: result
                    .rows
                    .last()
                    .map(|r| r.date.clone())
                    .unwrap_or_default(),
            };
            output::print_table(&[summary], format);
        }
    }

    Ok(())
}

#[derive(Tabled, Serialize)]
struct ForecastSummaryRow {
    #[tabled(rename = "MODEL")]
    model: String,
    #[tabled(rename = "PAYLOAD")]
    payload: String,
}

/// Request a forecast from rows stored in a JSON file
pub async fn forecast(
    client: &ApiClient,
    rows_path: &str,
    periods: u32,
    models: &[String],
    format: OutputFormat,
) -> Result<()> {
    let text = std::fs::read_to_string(rows_path)
        .with_context(|| format!("Failed to read rows file {rows_path}"))?;
    let rows: Vec<TimeSeriesRow> =
        serde_json::from_str(&text).context("Rows file must hold a JSON array of {date, value}")?;

    let request = ForecastRequest {
        rows,
        periods,
        models: models.to_vec(),
    };
    let payloads: ForecastPayloads = client.post("/forecast", &request).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&payloads)?);
        }
        OutputFormat::Table => {
            let rows: Vec<ForecastSummaryRow> = payloads
                .iter()
                .map(|(model, payload)| ForecastSummaryRow {
                    model: model.clone(),
                    payload: summarize(payload),
                })
                .collect();
            output::print_table(&rows, format);
        }
    }

    Ok(())
}

/// Short single-line description of an opaque payload
fn summarize(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::Array(items) => format!("{} points", items.len()),
        serde_json::Value::Object(map) => {
            let keys: Vec<_> = map.keys().take(5).cloned().collect();
            format!("object with keys: {}", keys.join(", "))
        }
        other => other.to_string(),
    }
}
