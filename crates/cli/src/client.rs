//! API client for communicating with the Forecast Service

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the Forecast Service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, detail);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API request and response types

/// Error body every non-2xx response carries
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Model id to readiness, as returned by /models/status
pub type ModelStatus = BTreeMap<String, bool>;

#[derive(Debug, Clone, Serialize)]
pub struct InstallRequest {
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallOutcome {
    pub ok: bool,
    pub model: String,
    pub installed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqliteSourceRequest {
    pub db_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestionResult {
    pub rows: Vec<TimeSeriesRow>,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub precision: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastRequest {
    pub rows: Vec<TimeSeriesRow>,
    pub periods: u32,
    pub models: Vec<String>,
}

/// Model id to opaque payload, as returned by /forecast
pub type ForecastPayloads = serde_json::Map<String, serde_json::Value>;
