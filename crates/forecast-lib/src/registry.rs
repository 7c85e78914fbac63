//! Static registry of supported forecasting models
//!
//! Maps each canonical model id to the Python modules whose presence implies
//! readiness and the pinned package specs that provision them. Read-only
//! after process start.

use crate::error::ForecastError;
use crate::models::canonical_model_id;

/// Descriptor for one registered model.
#[derive(Debug, Clone, Copy)]
pub struct ModelDescriptor {
    /// Unique canonical id (lowercase).
    pub id: &'static str,
    /// Modules whose existence implies the model is ready to run.
    pub import_probes: &'static [&'static str],
    /// Exact-version package specifiers handed to the installer, in order.
    pub install_specs: &'static [&'static str],
}

static MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "prophet",
        import_probes: &["prophet"],
        install_specs: &["prophet==1.1.5"],
    },
    ModelDescriptor {
        id: "neuralprophet",
        import_probes: &["neuralprophet", "torch"],
        install_specs: &["neuralprophet==0.8.0"],
    },
    ModelDescriptor {
        id: "holtwinters",
        import_probes: &["statsmodels"],
        install_specs: &["statsmodels==0.14.1"],
    },
];

/// Lookup table over the static descriptor set. Stateless and reentrant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegistry;

impl ModelRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Look up the descriptor for a canonical id.
    pub fn descriptor_of(&self, id: &str) -> Result<&'static ModelDescriptor, ForecastError> {
        MODELS
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| ForecastError::UnknownModel(vec![id.to_string()]))
    }

    pub fn contains(&self, id: &str) -> bool {
        MODELS.iter().any(|d| d.id == id)
    }

    /// All registered descriptors, in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &'static ModelDescriptor> {
        MODELS.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> {
        MODELS.iter().map(|d| d.id)
    }
}
