//! Backend that starts a local program for every rented unit.
//!
//! The program receives the workload as a trailing JSON argument and as
//! `LEASE_*` environment variables. Its stdout and stderr lines are streamed
//! back; its exit status ends the run.

use std::{
    collections::HashMap,
    path::PathBuf,
    process::Stdio,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use jiff::SignedDuration;
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::{mpsc, oneshot},
};

use super::{
    check_class, Provisioner, ProvisionError, RunEvent, UnitHandle, Workload, EVENT_BUFFER,
};
use crate::shutdown::Cancellation;

/// Runs each workload as a child process.
#[derive(Debug)]
pub struct ProcessProvisioner {
    program: PathBuf,
    args: Vec<String>,
    compute_classes: Vec<String>,
    next_unit: AtomicU64,
    /// Kill switches of the children still running, by unit id
    running: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl ProcessProvisioner {
    pub fn new(program: PathBuf, args: Vec<String>, compute_classes: Vec<String>) -> Self {
        Self {
            program,
            args,
            compute_classes,
            next_unit: AtomicU64::new(1),
            running: Mutex::new(HashMap::new()),
        }
    }

    fn command(&self, unit: &UnitHandle, workload: &Workload) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(workload.to_json())
            .env("LEASE_UNIT_ID", &unit.id)
            .env("LEASE_COMPUTE_CLASS", &unit.compute_class)
            .env("LEASE_NODE_ID", &workload.node_id)
            .env("LEASE_IMAGE", &workload.image)
            .env("LEASE_DURATION_SECS", workload.duration.as_secs().to_string())
            .env("LEASE_INVOICE_AMOUNT", workload.invoice_amount.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Provisioner for ProcessProvisioner {
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

        let id = format!("proc-{}", self.next_unit.fetch_add(1, Ordering::Relaxed));
        debug!("Acquired {compute_class} unit {id} for {budget:#}");
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
        let mut child = self
            .command(unit, workload)
            .spawn()
            .map_err(|e| ProvisionError::Run {
                unit: unit.id.clone(),
                reason: format!("failed to start {}: {e}", self.program.display()),
            })?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, tx.clone(), RunEvent::Stdout)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, tx.clone(), RunEvent::Stderr)));

        let (kill_tx, kill_rx) = oneshot::channel();
        self.running.lock().insert(unit.id.clone(), kill_tx);

        let cancel = cancel.clone();
        let unit_id = unit.id.clone();
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => Some(status.code()),
                    Err(e) => {
                        warn!("Failed to wait for workload on unit {unit_id}: {e}");
                        None
                    }
                },
                _ = cancel.cancelled() => None,
                _ = kill_rx => None,
            };

            if exited.is_none() {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill workload on unit {unit_id}: {e}");
                }
            }

            // Drain the pipes before reporting the exit
            for forwarder in [stdout, stderr].into_iter().flatten() {
                let _ = forwarder.await;
            }

            if let Some(code) = exited {
                let _ = tx.send(RunEvent::Exited { code }).await;
            }
        });

        Ok(rx)
    }

    async fn release(&self, unit: &UnitHandle) -> Result<(), ProvisionError> {
        if let Some(kill) = self.running.lock().remove(&unit.id) {
            // The child may have exited already; then nobody is listening
            let _ = kill.send(());
        }
        debug!("Released unit {}", unit.id);
        Ok(())
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<RunEvent>, wrap: fn(String) -> RunEvent)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(wrap(line)).await.is_err() {
            break;
        }
    }
}
