//! Forecast Service CLI
//!
//! A command-line tool for checking model readiness, triggering
//! installations, ingesting data sources and requesting forecasts.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{data, models};

/// Forecast Service CLI
#[derive(Parser)]
#[command(name = "forecastctl")]
#[command(author, version, about = "CLI for the Forecast Service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FORECAST_API_URL env var)
    #[arg(long, env = "FORECAST_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show readiness of every registered model
    Status,

    /// Install a model's dependencies
    Install {
        /// Model id to install (e.g. prophet)
        model: String,
    },

    /// Read and validate a time series from a SQLite data source
    Ingest {
        /// Path to the SQLite database file
        #[arg(long)]
        db_path: String,

        /// Table to read from (structured mode)
        #[arg(long)]
        table: Option<String>,

        /// Date column name
        #[arg(long, default_value = "date")]
        date_column: String,

        /// Value column name
        #[arg(long, default_value = "value")]
        value_column: String,

        /// Raw SELECT query (raw mode, overrides --table)
        #[arg(long)]
        sql: Option<String>,

        /// Inclusive start date bound (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// Inclusive end date bound (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,

        /// Row ceiling
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Request a forecast from one or more models
    Forecast {
        /// Path to a JSON file holding [{"date": ..., "value": ...}] rows
        #[arg(long)]
        rows: String,

        /// Forecast horizon in periods
        #[arg(long, default_value_t = 30)]
        periods: u32,

        /// Models to run (repeatable)
        #[arg(long, default_value = "prophet")]
        models: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Status => {
            models::show_status(&client, cli.format).await?;
        }
        Commands::Install { model } => {
            models::install_model(&client, &model, cli.format).await?;
        }
        Commands::Ingest {
            db_path,
            table,
            date_column,
            value_column,
            sql,
            start_date,
            end_date,
            limit,
        } => {
            let request = client::SqliteSourceRequest {
                db_path,
                table,
                date_column: Some(date_column),
                value_column: Some(value_column),
                sql,
                start_date,
                end_date,
                limit,
            };
            data::ingest(&client, &request, cli.format).await?;
        }
        Commands::Forecast {
            rows,
            periods,
            models,
        } => {
            data::forecast(&client, &rows, periods, &models, cli.format).await?;
        }
    }

    Ok(())
}
