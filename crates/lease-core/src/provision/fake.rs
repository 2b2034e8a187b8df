//! Fake provisioner for testing

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use jiff::SignedDuration;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use super::{Provisioner, ProvisionError, RunEvent, UnitHandle, Workload, EVENT_BUFFER};
use crate::{clock::FakeClock, shutdown::Cancellation};

/// Recorded provisioner call
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionCall {
    Connect,
    Disconnect,
    Acquire {
        compute_class: String,
        budget: SignedDuration,
    },
    Run {
        unit_id: String,
        workload: Workload,
    },
    Release {
        unit_id: String,
    },
}

struct FakeProvisionerState {
    calls: Vec<ProvisionCall>,
    next_unit: u64,
    acquire_error: Option<String>,
    exit_codes: VecDeque<i32>,
    output: Vec<String>,
    clock: Option<FakeClock>,
    hold_runs: bool,
    acquire_delay: Option<Duration>,
}

/// Fake provisioner for testing
///
/// Runs finish immediately with exit code 0 unless told otherwise. With a
/// clock attached, every run advances it by the workload's duration, as if
/// the unit had been busy for its whole budget.
#[derive(Clone)]
pub struct FakeProvisioner {
    inner: Arc<Mutex<FakeProvisionerState>>,
    gate: Arc<Semaphore>,
}

impl Default for FakeProvisioner {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProvisionerState {
                calls: Vec::new(),
                next_unit: 0,
                acquire_error: None,
                exit_codes: VecDeque::new(),
                output: Vec::new(),
                clock: None,
                hold_runs: false,
                acquire_delay: None,
            })),
            gate: Arc::new(Semaphore::new(0)),
        }
    }
}

impl FakeProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `clock` by each workload's duration when it runs
    pub fn with_clock(self, clock: FakeClock) -> Self {
        self.inner.lock().clock = Some(clock);
        self
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.inner.lock().calls.clone()
    }

    /// Workloads run so far, in order
    pub fn workloads(&self) -> Vec<Workload> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ProvisionCall::Run { workload, .. } => Some(workload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of acquired units not yet released
    pub fn outstanding_units(&self) -> usize {
        let state = self.inner.lock();
        let acquired = state
            .calls
            .iter()
            .filter(|c| matches!(c, ProvisionCall::Acquire { .. }))
            .count();
        let released = state
            .calls
            .iter()
            .filter(|c| matches!(c, ProvisionCall::Release { .. }))
            .count();
        acquired.saturating_sub(released)
    }

    /// Make every subsequent acquire fail
    pub fn set_acquire_error(&self, reason: Option<&str>) {
        self.inner.lock().acquire_error = reason.map(str::to_string);
    }

    /// Hold every acquire for `delay` after the unit is reserved, ignoring
    /// cancellation like a remote call already in flight
    pub fn set_acquire_delay(&self, delay: Option<Duration>) {
        self.inner.lock().acquire_delay = delay;
    }

    /// Queue exit codes for the next runs; runs beyond the queue exit with 0
    pub fn push_exit_code(&self, code: i32) {
        self.inner.lock().exit_codes.push_back(code);
    }

    /// Lines every run prints to stdout
    pub fn set_output(&self, output: Vec<String>) {
        self.inner.lock().output = output;
    }

    /// Keep runs going until [`finish_runs`](Self::finish_runs) or cancellation
    pub fn hold_runs(&self, hold: bool) {
        self.inner.lock().hold_runs = hold;
    }

    /// Let `count` held runs exit
    pub fn finish_runs(&self, count: usize) {
        self.gate.add_permits(count);
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn connect(&self) -> Result<(), ProvisionError> {
        self.inner.lock().calls.push(ProvisionCall::Connect);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ProvisionError> {
        self.inner.lock().calls.push(ProvisionCall::Disconnect);
        Ok(())
    }

    async fn acquire(
        &self,
        compute_class: &str,
        budget: SignedDuration,
        _cancel: &Cancellation,
    ) -> Result<UnitHandle, ProvisionError> {
        let (unit, delay) = {
            let mut state = self.inner.lock();
            if let Some(reason) = state.acquire_error.clone() {
                return Err(ProvisionError::Acquire {
                    compute_class: compute_class.to_string(),
                    reason,
                });
            }
            state.calls.push(ProvisionCall::Acquire {
                compute_class: compute_class.to_string(),
                budget,
            });
            state.next_unit += 1;
            let unit = UnitHandle {
                id: format!("fake-{}", state.next_unit),
                compute_class: compute_class.to_string(),
            };
            (unit, state.acquire_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(unit)
    }

    async fn run(
        &self,
        unit: &UnitHandle,
        workload: &Workload,
        cancel: &Cancellation,
    ) -> Result<mpsc::Receiver<RunEvent>, ProvisionError> {
        let (output, code, clock, hold) = {
            let mut state = self.inner.lock();
            state.calls.push(ProvisionCall::Run {
                unit_id: unit.id.clone(),
                workload: workload.clone(),
            });
            (
                state.output.clone(),
                state.exit_codes.pop_front().unwrap_or(0),
                state.clock.clone(),
                state.hold_runs,
            )
        };

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let gate = Arc::clone(&self.gate);
        let cancel = cancel.clone();
        let duration = workload.duration;

        tokio::spawn(async move {
            for line in output {
                let _ = tx.send(RunEvent::Stdout(line)).await;
            }
            if hold {
                tokio::select! {
                    permit = gate.acquire() => {
                        if let Ok(permit) = permit {
                            permit.forget();
                        }
                    }
                    _ = cancel.cancelled() => return,
                }
            }
            if let Some(clock) = clock {
                clock.advance(duration);
            }
            let _ = tx.send(RunEvent::Exited { code: Some(code) }).await;
        });

        Ok(rx)
    }

    async fn release(&self, unit: &UnitHandle) -> Result<(), ProvisionError> {
        self.inner.lock().calls.push(ProvisionCall::Release {
            unit_id: unit.id.clone(),
        });
        Ok(())
    }
}
