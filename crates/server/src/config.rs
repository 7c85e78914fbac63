//! Server configuration

use anyhow::Result;
use serde::Deserialize;

/// Service configuration, loaded from `FORECAST_`-prefixed environment
/// variables with defaults for local development.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Python interpreter used for probes, installs and engine runs
    #[serde(default = "default_python_bin")]
    pub python_bin: String,

    /// Python module invoked as the forecasting engine runner
    #[serde(default = "default_engine_module")]
    pub engine_module: String,

    /// Instance name used in structured log events
    #[serde(default = "default_instance")]
    pub instance: String,
}

fn default_api_port() -> u16 {
    8080
}

fn default_python_bin() -> String {
    "python3".to_string()
}

fn default_engine_module() -> String {
    "forecast_runner".to_string()
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "forecast-service".to_string())
}

impl ServiceConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FORECAST"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| ServiceConfig {
            api_port: default_api_port(),
            python_bin: default_python_bin(),
            engine_module: default_engine_module(),
            instance: default_instance(),
        }))
    }
}
