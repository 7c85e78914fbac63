//! Error taxonomy for the forecast core
//!
//! Validation-class errors are the caller's fault and map to 400-class
//! responses at the API boundary; `Busy` is a distinct retryable conflict;
//! everything else is a server-side failure carrying best-effort diagnostics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// One or more requested model ids are not registered. Batch-reported:
    /// the vector holds every offending id, not just the first.
    #[error("unknown model(s): {}", .0.join(", "))]
    UnknownModel(Vec<String>),

    /// Structured ingestion requires a table name, raw ingestion a query.
    #[error("data source request must supply a table name or a raw query")]
    MissingSource,

    /// An identifier failed the allow-list check before any SQL was built.
    #[error("invalid identifier {0:?}: only ASCII letters, digits and underscores are allowed, not starting with a digit")]
    InvalidIdentifier(String),

    /// A raw query failed the shape checks before any database access.
    #[error("invalid raw query: {0}")]
    InvalidQuery(&'static str),

    /// Fewer than three usable rows survived validation.
    #[error("only {0} usable row(s) after validation, at least 3 required")]
    InsufficientData(usize),

    /// Another installation is in flight; the caller must retry later.
    #[error("another model installation is in progress")]
    Busy,

    /// The package installer exited non-zero; carries its diagnostic text.
    #[error("package installation failed: {0}")]
    InstallationFailed(String),

    /// The installer reported success but the model is still not importable.
    /// A packaging mismatch; never retried automatically.
    #[error("installer succeeded but the model dependencies are still not importable")]
    VerificationFailed,

    /// The SQLite driver reported a failure while reading the data source.
    #[error("database read failed: {0}")]
    DatabaseReadFailed(String),

    /// One model's engine failed, aborting the whole multi-model request.
    #[error("forecast engine for model {model:?} failed: {detail}")]
    ForecastEngineFailed { model: String, detail: String },
}

impl ForecastError {
    /// Whether this error is the client's fault (malformed request) as
    /// opposed to a server-side or transient failure.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ForecastError::UnknownModel(_)
                | ForecastError::MissingSource
                | ForecastError::InvalidIdentifier(_)
                | ForecastError::InvalidQuery(_)
                | ForecastError::InsufficientData(_)
        )
    }
}

impl From<rusqlite::Error> for ForecastError {
    fn from(err: rusqlite::Error) -> Self {
        ForecastError::DatabaseReadFailed(err.to_string())
    }
}
