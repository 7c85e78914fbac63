//! Readiness probing for model dependencies
//!
//! A model is ready when every one of its import probes resolves to an
//! existing importable module. Probing is an existence check only; the
//! probed modules are never executed or fully imported, so probing an
//! uninstalled model cannot trigger side effects. Results are never cached
//! because the environment changes underneath us (e.g. after an install).

use crate::error::ForecastError;
use crate::registry::{ModelDescriptor, ModelRegistry};
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

/// Existence check for a set of importable Python modules.
///
/// Implementations must observe only whether the modules can be found,
/// never load them.
pub trait ImportProbe: Send + Sync {
    fn modules_exist(&self, modules: &[&str]) -> bool;
}

/// One-liner handed to the interpreter: a module spec lookup per argument,
/// exit 0 iff all are found. `find_spec` locates a module without importing it.
const FIND_SPEC_SNIPPET: &str = "import importlib.util, sys; \
sys.exit(0 if all(importlib.util.find_spec(m) is not None for m in sys.argv[1:]) else 1)";

/// Probes module existence through a short-lived Python interpreter.
pub struct PythonImportProbe {
    python_bin: String,
}

impl PythonImportProbe {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
        }
    }
}

impl ImportProbe for PythonImportProbe {
    fn modules_exist(&self, modules: &[&str]) -> bool {
        let result = Command::new(&self.python_bin)
            .arg("-c")
            .arg(FIND_SPEC_SNIPPET)
            .args(modules)
            .output();

        match result {
            Ok(output) => output.status.success(),
            Err(err) => {
                warn!(python = %self.python_bin, error = %err, "import probe could not run");
                false
            }
        }
    }
}

/// Live readiness checks over the registry. Stateless and reentrant.
#[derive(Clone)]
pub struct ReadinessProber {
    registry: ModelRegistry,
    probe: Arc<dyn ImportProbe>,
}

impl ReadinessProber {
    pub fn new(registry: ModelRegistry, probe: Arc<dyn ImportProbe>) -> Self {
        Self { registry, probe }
    }

    /// True iff every import probe of the model resolves.
    pub fn is_installed(&self, id: &str) -> Result<bool, ForecastError> {
        let descriptor = self.registry.descriptor_of(id)?;
        Ok(self.descriptor_installed(descriptor))
    }

    pub fn descriptor_installed(&self, descriptor: &ModelDescriptor) -> bool {
        let ready = self.probe.modules_exist(descriptor.import_probes);
        debug!(model = descriptor.id, ready, "readiness probe");
        ready
    }

    /// Live readiness of every registered model.
    pub fn status_all(&self) -> BTreeMap<String, bool> {
        self.registry
            .descriptors()
            .map(|d| (d.id.to_string(), self.descriptor_installed(d)))
            .collect()
    }
}
