//! Model readiness and installation commands

use crate::client::{ApiClient, InstallOutcome, InstallRequest, ModelStatus};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct StatusRow {
    #[tabled(rename = "MODEL")]
    model: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

/// Show readiness of every registered model
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: ModelStatus = client.get("/models/status").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Table => {
            let rows: Vec<StatusRow> = status
                .into_iter()
                .map(|(model, ready)| StatusRow {
                    model,
                    status: output::color_ready(ready),
                })
                .collect();
            output::print_table(&rows, format);
        }
    }

    Ok(())
}

/// Install a model's dependencies and report the outcome
pub async fn install_model(client: &ApiClient, model: &str, format: OutputFormat) -> Result<()> {
    output::print_info(&format!("Installing dependencies for {model}, this can take a while"));

    let outcome: InstallOutcome = client
        .post(
            "/models/install",
            &InstallRequest {
                model: model.to_string(),
            },
        )
        .await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "ok": outcome.ok,
                "model": outcome.model,
                "installed": outcome.installed,
                "detail": outcome.detail,
            }))?);
        }
        OutputFormat::Table => {
            output::print_success(&format!("{}: {}", outcome.model, outcome.detail));
        }
    }

    Ok(())
}
