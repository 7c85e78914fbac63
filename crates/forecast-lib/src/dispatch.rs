//! Multi-model forecast dispatch
//!
//! A single logical request fans out to one engine call per requested model.
//! Every requested id is validated against the registry before any engine
//! runs, and the failure contract is all-or-nothing: one failing engine
//! aborts the whole request, clients never see a partial result.

use crate::error::ForecastError;
use crate::models::{canonical_model_id, ForecastPayloads, TimeSeriesRow};
use crate::registry::ModelRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::debug;

/// One opaque forecasting strategy. Implementations exist per registered
/// model id; errors are model-specific text consumed by the dispatcher.
pub trait ForecastEngine: Send + Sync {
    fn forecast(&self, rows: &[TimeSeriesRow], periods: u32) -> Result<Value, String>;
}

/// Engine that delegates to the configured Python runner module, writing
/// `{model, rows, periods}` JSON on stdin and reading the payload JSON from
/// stdout. Blocks until the subprocess exits; no timeout of its own.
pub struct PythonEngine {
    python_bin: String,
    runner_module: String,
    model_id: String,
}

impl PythonEngine {
    pub fn new(
        python_bin: impl Into<String>,
        runner_module: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            python_bin: python_bin.into(),
            runner_module: runner_module.into(),
            model_id: model_id.into(),
        }
    }
}

impl ForecastEngine for PythonEngine {
    fn forecast(&self, rows: &[TimeSeriesRow], periods: u32) -> Result<Value, String> {
        let request = serde_json::json!({
            "model": self.model_id,
            "rows": rows,
            "periods": periods,
        });

        let mut child = Command::new(&self.python_bin)
            .args(["-m", &self.runner_module])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| format!("failed to spawn engine: {err}"))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "engine stdin unavailable".to_string())?;
        stdin
            .write_all(request.to_string().as_bytes())
            .map_err(|err| format!("failed to write engine request: {err}"))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .map_err(|err| format!("failed to collect engine output: {err}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(if stderr.is_empty() {
                format!("engine exited with {}", output.status)
            } else {
                stderr
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|err| format!("engine produced invalid JSON: {err}"))
    }
}

/// Registry of named engine strategies, keyed by canonical model id.
#[derive(Clone, Default)]
pub struct EngineSet {
    engines: HashMap<String, Arc<dyn ForecastEngine>>,
}

impl EngineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, id: &str, engine: Arc<dyn ForecastEngine>) -> Self {
        self.engines.insert(canonical_model_id(id), engine);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ForecastEngine>> {
        self.engines.get(id)
    }

    /// Python-backed engine for every registered model.
    pub fn python(registry: &ModelRegistry, python_bin: &str, runner_module: &str) -> Self {
        registry.ids().fold(Self::new(), |set, id| {
            set.with_engine(id, Arc::new(PythonEngine::new(python_bin, runner_module, id)))
        })
    }
}

/// Validates a multi-model request and fans out to the engines.
/// Stateless and reentrant.
pub struct ForecastDispatcher {
    registry: ModelRegistry,
    engines: EngineSet,
}

impl ForecastDispatcher {
    pub fn new(registry: ModelRegistry, engines: EngineSet) -> Self {
        Self { registry, engines }
    }

    /// Run every requested model over the shared row set.
    ///
    /// All unknown ids are collected into a single `UnknownModel` error
    /// before any engine is invoked. Duplicate ids are collapsed to their
    /// first occurrence so each engine runs once. Any engine failure fails
    /// the whole request.
    pub fn forecast(
        &self,
        rows: &[TimeSeriesRow],
        periods: u32,
        models: &[String],
    ) -> Result<ForecastPayloads, ForecastError> {
        let mut requested: Vec<String> = Vec::new();
        for model in models {
            let id = canonical_model_id(model);
            if !requested.contains(&id) {
                requested.push(id);
            }
        }

        let unknown: Vec<String> = requested
            .iter()
            .filter(|id| !self.registry.contains(id))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ForecastError::UnknownModel(unknown));
        }

        let mut payloads = ForecastPayloads::new();
        for id in &requested {
            let engine = self
                .engines
                .get(id)
                .ok_or_else(|| ForecastError::UnknownModel(vec![id.clone()]))?;

            debug!(model = %id, periods, rows = rows.len(), "invoking forecast engine");
            let payload =
                engine
                    .forecast(rows, periods)
                    .map_err(|detail| ForecastError::ForecastEngineFailed {
                        model: id.clone(),
                        detail,
                    })?;
            payloads.insert(id.clone(), payload);
        }

        Ok(payloads)
    }
}
