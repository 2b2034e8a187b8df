//! Backend that rents nothing and lets each workload occupy its budget.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use jiff::SignedDuration;
use log::debug;
use tokio::sync::mpsc;

use super::{
    check_class, Provisioner, ProvisionError, RunEvent, UnitHandle, Workload, EVENT_BUFFER,
};
use crate::shutdown::Cancellation;

/// Dry-run provisioner.
#[derive(Debug, Default)]
pub struct SimulatedProvisioner {
    compute_classes: Vec<String>,
    next_unit: AtomicU64,
}

impl SimulatedProvisioner {
    pub fn new(compute_classes: Vec<String>) -> Self {
        Self {
            compute_classes,
            next_unit: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Provisioner for SimulatedProvisioner {
    async fn acquire(
        &self,
        compute_class: &str,
        budget: SignedDuration,
        cancel: &Cancellation,
    ) -> Result<UnitHandle, ProvisionError> {
        check_class(&self.compute_classes, compute_class)?;
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        let id = format!("sim-{}", self.next_unit.fetch_add(1, Ordering::Relaxed));
        debug!("Simulated {compute_class} unit {id} for {budget:#}");
        Ok(UnitHandle {
            id,
            compute_class: compute_class.to_string(),
        })
    }

    async fn run(
        &self,
        unit: &UnitHandle,
        workload: &Workload,
        cancel: &Cancellation,
    ) -> Result<mpsc::Receiver<RunEvent>, ProvisionError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let budget = workload.duration.unsigned_abs();
        let line = format!(
            "simulating {} on {} for {:#}",
            workload.image, unit.id, workload.duration
        );
        let cancel = cancel.clone();

        tokio::spawn(async move {
            if tx.send(RunEvent::Stdout(line)).await.is_err() {
                return;
            }
            // On cancellation the sender is dropped without an exit event
            if cancel.sleep(budget).await.is_ok() {
                let _ = tx.send(RunEvent::Exited { code: Some(0) }).await;
            }
        });

        Ok(rx)
    }

    async fn release(&self, unit: &UnitHandle) -> Result<(), ProvisionError> {
        debug!("Released simulated unit {}", unit.id);
        Ok(())
    }
}
