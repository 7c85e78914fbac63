//! Single-flight installation of optional model dependencies
//!
//! Heavy statistical backends are provisioned on demand through the external
//! package tool. At most one installation of any model may be in flight
//! process-wide; contenders fail fast with `Busy` instead of queueing, which
//! bounds concurrent downloads without a wait queue. No step here retries
//! automatically.

use crate::error::ForecastError;
use crate::models::{canonical_model_id, InstallOutcome};
use crate::probe::ReadinessProber;
use crate::registry::ModelRegistry;
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tracing::{info, warn};

/// Process-wide mutual exclusion for installations.
///
/// A singleton owned by the service lifetime and injected into the manager,
/// so tests can hold the guard themselves to simulate an in-flight install.
/// The guard is only ever held for the duration of one `install` call.
#[derive(Debug, Clone, Default)]
pub struct InstallLock {
    inner: Arc<Mutex<()>>,
}

impl InstallLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking acquire. Returns `None` when another installation holds
    /// the lock. A poisoned lock is recovered: the mutex protects no data,
    /// only the right to run the installer.
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        }
    }
}

/// Exit status and captured diagnostics of one installer invocation.
#[derive(Debug, Clone)]
pub struct InstallerOutput {
    pub success: bool,
    pub diagnostics: String,
}

/// External package tool, behind a trait so tests never shell out.
pub trait PackageInstaller: Send + Sync {
    /// Install the given pinned specs synchronously. Errors here mean the
    /// tool could not be invoked at all; a tool that ran and failed is a
    /// successful `Ok` with `success == false`.
    fn install(&self, specs: &[&str]) -> Result<InstallerOutput, ForecastError>;
}

/// Installs pinned specs with `<python> -m pip install`, blocking until the
/// subprocess exits. Imposes no timeout of its own.
pub struct PipInstaller {
    python_bin: String,
}

impl PipInstaller {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
        }
    }
}

impl PackageInstaller for PipInstaller {
    fn install(&self, specs: &[&str]) -> Result<InstallerOutput, ForecastError> {
        let output = Command::new(&self.python_bin)
            .args(["-m", "pip", "install"])
            .args(specs)
            .output()
            .map_err(|err| {
                ForecastError::InstallationFailed(format!(
                    "failed to spawn {}: {err}",
                    self.python_bin
                ))
            })?;

        // Prefer stderr for diagnostics, fall back to stdout.
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostics = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };

        Ok(InstallerOutput {
            success: output.status.success(),
            diagnostics,
        })
    }
}

/// Orchestrates the provisioning flow: probe, lock, install, verify.
pub struct InstallManager {
    registry: ModelRegistry,
    prober: ReadinessProber,
    installer: Arc<dyn PackageInstaller>,
    lock: InstallLock,
}

impl InstallManager {
    pub fn new(
        registry: ModelRegistry,
        prober: ReadinessProber,
        installer: Arc<dyn PackageInstaller>,
        lock: InstallLock,
    ) -> Self {
        Self {
            registry,
            prober,
            installer,
            lock,
        }
    }

    /// Provision one model's dependencies.
    ///
    /// Idempotent for already-installed models: succeeds immediately with
    /// zero subprocess invocations. Otherwise runs the installer under the
    /// process-wide lock and re-probes afterwards; an installer that claims
    /// success while the modules remain unimportable is a hard
    /// `VerificationFailed`.
    pub fn install(&self, id: &str) -> Result<InstallOutcome, ForecastError> {
        let id = canonical_model_id(id);
        let descriptor = self.registry.descriptor_of(&id)?;

        if self.prober.descriptor_installed(descriptor) {
            return Ok(InstallOutcome::already_installed(&id));
        }

        // Scoped acquisition: the guard is released on every exit path below.
        let _guard = self.lock.try_acquire().ok_or(ForecastError::Busy)?;

        info!(model = %id, specs = ?descriptor.install_specs, "installing model dependencies");
        let output = self.installer.install(descriptor.install_specs)?;
        if !output.success {
            warn!(model = %id, "installer exited with failure");
            return Err(ForecastError::InstallationFailed(output.diagnostics));
        }

        if !self.prober.descriptor_installed(descriptor) {
            warn!(model = %id, "installer succeeded but import probes still fail");
            return Err(ForecastError::VerificationFailed);
        }

        info!(model = %id, "model dependencies installed");
        Ok(InstallOutcome::installed(&id))
    }
}
