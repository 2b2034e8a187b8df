//! Provisioning backends: where a job's compute unit is rented and its
//! workload runs.
//!
//! A job goes through `acquire` → `run` → `release`. `release` is called on
//! every exit path, including failures and cancellation.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::SignedDuration;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    config::{ProvisionerConfig, ProvisionerKind},
    error::{LeaseError, Result},
    shutdown::Cancellation,
};

mod process;
mod simulated;

pub use process::ProcessProvisioner;
pub use simulated::SimulatedProvisioner;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProvisioner, ProvisionCall};

/// Capacity of the per-run event channel.
pub(crate) const EVENT_BUFFER: usize = 64;

/// Errors from provisioning operations
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("compute class '{0}' is not offered by this provisioner")]
    UnsupportedClass(String),
    #[error("failed to acquire a '{compute_class}' unit: {reason}")]
    Acquire {
        compute_class: String,
        reason: String,
    },
    #[error("workload on unit {unit} failed: {reason}")]
    Run { unit: String, reason: String },
    #[error("failed to release unit {unit}: {reason}")]
    Release { unit: String, reason: String },
    #[error("workload on unit {unit} exceeded its budget of {budget:#}")]
    Timeout {
        unit: String,
        budget: SignedDuration,
    },
    #[error("provisioning cancelled")]
    Cancelled,
}

/// A rented compute unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHandle {
    pub id: String,
    pub compute_class: String,
}

/// What a unit is asked to run for one job.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Workload {
    pub node_id: String,
    pub image: String,
    /// Budget of the run; also the duration the workload should occupy
    #[serde(with = "duration_secs")]
    pub duration: SignedDuration,
    pub invoice_amount: f64,
}

impl Workload {
    /// JSON document handed to external backends.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Output of a running workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Stdout(String),
    Stderr(String),
    /// The workload finished; `code` is `None` when it was killed by a signal
    Exited { code: Option<i32> },
}

/// Backend that rents compute units and runs workloads on them.
#[async_trait]
pub trait Provisioner: Send + Sync + 'static {
    /// Opens whatever session the backend needs. Default is a no-op.
    async fn connect(&self) -> std::result::Result<(), ProvisionError> {
        Ok(())
    }

    /// Tears the session down at shutdown. Default is a no-op.
    async fn disconnect(&self) -> std::result::Result<(), ProvisionError> {
        Ok(())
    }

    /// Rents a unit of `compute_class` for at most `budget`.
    async fn acquire(
        &self,
        compute_class: &str,
        budget: SignedDuration,
        cancel: &Cancellation,
    ) -> std::result::Result<UnitHandle, ProvisionError>;

    /// Starts `workload` on `unit` and streams its output.
    ///
    /// The stream ends with [`RunEvent::Exited`]; a stream that closes
    /// without it means the run was abandoned (cancelled or released).
    async fn run(
        &self,
        unit: &UnitHandle,
        workload: &Workload,
        cancel: &Cancellation,
    ) -> std::result::Result<mpsc::Receiver<RunEvent>, ProvisionError>;

    /// Gives the unit back, stopping anything still running on it.
    async fn release(&self, unit: &UnitHandle) -> std::result::Result<(), ProvisionError>;
}

/// Shared handle to a provisioner.
pub type SharedProvisioner = Arc<dyn Provisioner>;

/// Builds the backend selected by `config`.
pub fn from_config(config: &ProvisionerConfig) -> Result<SharedProvisioner> {
    match config.kind {
        ProvisionerKind::Simulated => Ok(Arc::new(SimulatedProvisioner::new(
            config.compute_classes.clone(),
        ))),
        ProvisionerKind::Process => {
            let program = config.program.clone().ok_or_else(|| {
                LeaseError::configuration("provisioner.program is required for the process backend")
            })?;
            Ok(Arc::new(ProcessProvisioner::new(
                program,
                config.args.clone(),
                config.compute_classes.clone(),
            )))
        }
    }
}

/// Checks `compute_class` against an allowlist; an empty list accepts any.
pub(crate) fn check_class(
    allowed: &[String],
    compute_class: &str,
) -> std::result::Result<(), ProvisionError> {
    if allowed.is_empty() || allowed.iter().any(|c| c == compute_class) {
        Ok(())
    } else {
        Err(ProvisionError::UnsupportedClass(compute_class.to_string()))
    }
}

mod duration_secs {
    use jiff::SignedDuration;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &SignedDuration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.as_secs())
    }
}
