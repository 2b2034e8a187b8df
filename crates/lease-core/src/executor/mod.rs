//! Plan executor: walks one plan's job chain on the provisioner.
//!
//! Starting from the job the monitor found due, each job is re-prorated at
//! dispatch time, run to completion (or failure) and followed by the next
//! job of the same plan until the chain is exhausted:
//!
//! ```text
//! active ─▶ [wait for start] ─▶ prorate ─▶ acquire ─▶ run ─▶ release ─▶ next?
//!                                  │                                    │
//!                                  └─ below minimum: failed ────────────┤
//!                                                           none ─▶ completed
//! ```
//!
//! A failed job is recorded and the walk moves on; it is never retried.
//! Cancellation stops the walk, puts the interrupted job back to `pending`
//! and leaves the plan `active` so the next process resumes it.

use std::fmt;

use jiff::{SignedDuration, Timestamp};
use log::{debug, info, warn};

use crate::{
    clock::SharedClock,
    config::Config,
    error::Result,
    models::{DueJob, HandOff, JobStatus, PlanStatus},
    provision::{ProvisionError, RunEvent, SharedProvisioner, UnitHandle, Workload},
    shutdown::Cancellation,
    store::Store,
};

#[cfg(test)]
mod tests;

/// Slack granted on top of a run's budget before it counts as timed out.
const RUN_TIMEOUT_FACTOR: f64 = 1.05;

/// Tunables of the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub time_lag: SignedDuration,
    pub minimum_duration: SignedDuration,
    pub image: String,
}

impl From<&Config> for ExecutorSettings {
    fn from(config: &Config) -> Self {
        Self {
            time_lag: config.time_lag,
            minimum_duration: config.minimum_duration,
            image: config.provisioner.image.clone(),
        }
    }
}

/// How a chain walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanEnd {
    /// Every job was attempted and the plan is `completed`
    Completed,
    /// Shutdown stopped the walk; the plan stays `active`
    Interrupted,
}

/// Summary of one [`PlanExecutor::execute_plan`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    pub plan_id: u64,
    pub node_id: String,
    pub jobs_done: usize,
    pub jobs_failed: usize,
    pub end: PlanEnd,
}

impl fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = match self.end {
            PlanEnd::Completed => "completed",
            PlanEnd::Interrupted => "interrupted",
        };
        write!(
            f,
            "plan {} ({}) {end}: {} done, {} failed",
            self.plan_id, self.node_id, self.jobs_done, self.jobs_failed
        )
    }
}

/// Result of a single job.
#[derive(Debug)]
enum JobResult {
    Done,
    Failed(String),
    /// Another executor already moved the job on
    Skipped,
    Cancelled,
}

/// Runs plan chains against a provisioner.
#[derive(Clone)]
pub struct PlanExecutor {
    store: Store,
    provisioner: SharedProvisioner,
    clock: SharedClock,
    settings: ExecutorSettings,
    cancel: Cancellation,
}

impl PlanExecutor {
    pub fn new(
        store: Store,
        provisioner: SharedProvisioner,
        clock: SharedClock,
        settings: ExecutorSettings,
        cancel: Cancellation,
    ) -> Self {
        Self {
            store,
            provisioner,
            clock,
            settings,
            cancel,
        }
    }

    /// Executes `due` and every later job of its plan.
    ///
    /// # Errors
    ///
    /// Only store failures abort the walk; provisioning failures are recorded
    /// on the job and the walk continues.
    pub async fn execute_plan(&self, due: DueJob) -> Result<PlanOutcome> {
        let plan_id = due.plan_id;
        let mut outcome = PlanOutcome {
            plan_id,
            node_id: due.node_id.clone(),
            jobs_done: 0,
            jobs_failed: 0,
            end: PlanEnd::Completed,
        };

        info!(
            "Executing plan {plan_id} for node {} from job {}",
            due.node_id,
            due.order_index()
        );
        self.store
            .update_plan_status(plan_id, PlanStatus::Active)
            .await?;

        let mut current = due;
        loop {
            match self.run_job(&current).await? {
                JobResult::Done => outcome.jobs_done += 1,
                JobResult::Failed(reason) => {
                    warn!(
                        "Job {} of plan {plan_id} ({}) failed: {reason}",
                        current.order_index(),
                        current.node_id
                    );
                    outcome.jobs_failed += 1;
                }
                JobResult::Skipped => {}
                JobResult::Cancelled => {
                    info!(
                        "Plan {plan_id} interrupted at job {}",
                        current.order_index()
                    );
                    outcome.end = PlanEnd::Interrupted;
                    return Ok(outcome);
                }
            }

            let next = self
                .store
                .query_next_job(plan_id, current.order_index(), self.adjusted_now())
                .await?;
            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        self.store
            .update_plan_status(plan_id, PlanStatus::Completed)
            .await?;
        info!("Finished {outcome}");
        Ok(outcome)
    }

    /// `now - time_lag`, the instant the allocation source considers current.
    fn adjusted_now(&self) -> Timestamp {
        self.clock
            .now()
            .checked_sub(self.settings.time_lag)
            .unwrap_or(Timestamp::MIN)
    }

    async fn run_job(&self, due: &DueJob) -> Result<JobResult> {
        let job = &due.job;

        // The previous job may have ended before this one's slice begins
        let adjusted_now = self.adjusted_now();
        if adjusted_now < job.start_at {
            let wait = job.start_at.duration_since(adjusted_now);
            debug!(
                "Job {} of plan {} starts in {wait:#}, waiting",
                job.order_index, job.plan_id
            );
            if self.cancel.sleep(wait.unsigned_abs()).await.is_err() {
                return Ok(JobResult::Cancelled);
            }
        }
        if self.cancel.is_cancelled() {
            return Ok(JobResult::Cancelled);
        }

        let hand_off = job.hand_off(self.adjusted_now());
        if hand_off.duration < self.settings.minimum_duration {
            let reason = format!(
                "only {:#} left, below the minimum of {:#}",
                hand_off.duration, self.settings.minimum_duration
            );
            self.store
                .update_job_status(job.id, JobStatus::Failed, Some(reason.clone()))
                .await?;
            return Ok(JobResult::Failed(reason));
        }

        if !self
            .store
            .update_job_status(job.id, JobStatus::Running, None)
            .await?
        {
            debug!("Job {} is no longer pending, skipping", job.id);
            return Ok(JobResult::Skipped);
        }

        debug!(
            "Dispatching job {} of plan {} on {}: {:#} for {:.2}",
            job.order_index, job.plan_id, due.node_id, hand_off.duration, hand_off.invoice_amount
        );

        match self.provision(due, hand_off).await {
            Ok(()) => {
                self.store
                    .update_job_status(job.id, JobStatus::Done, None)
                    .await?;
                Ok(JobResult::Done)
            }
            Err(ProvisionError::Cancelled) => {
                self.store
                    .update_job_status(job.id, JobStatus::Pending, None)
                    .await?;
                Ok(JobResult::Cancelled)
            }
            Err(e) => {
                let reason = e.to_string();
                self.store
                    .update_job_status(job.id, JobStatus::Failed, Some(reason.clone()))
                    .await?;
                Ok(JobResult::Failed(reason))
            }
        }
    }

    /// Acquire, run and release; the unit is released on every path once
    /// acquire has returned it.
    async fn provision(
        &self,
        due: &DueJob,
        hand_off: HandOff,
    ) -> std::result::Result<(), ProvisionError> {
        // Not raced against cancellation: a unit reserved by an acquire in
        // flight has to come back so it can be released
        let unit = self
            .provisioner
            .acquire(&due.compute_class, hand_off.duration, &self.cancel)
            .await?;

        let workload = Workload {
            node_id: due.node_id.clone(),
            image: self.settings.image.clone(),
            duration: hand_off.duration,
            invoice_amount: hand_off.invoice_amount,
        };
        let result = if self.cancel.is_cancelled() {
            Err(ProvisionError::Cancelled)
        } else {
            self.run_workload(&unit, &workload).await
        };

        if let Err(e) = self.provisioner.release(&unit).await {
            warn!("Failed to release unit {}: {e}", unit.id);
        }
        result
    }

    /// Streams the workload's output to the log until it exits, times out or
    /// is cancelled.
    async fn run_workload(
        &self,
        unit: &UnitHandle,
        workload: &Workload,
    ) -> std::result::Result<(), ProvisionError> {
        let mut events = self.provisioner.run(unit, workload, &self.cancel).await?;
        let node_id = &workload.node_id;

        let drain = async {
            while let Some(event) = events.recv().await {
                match event {
                    RunEvent::Stdout(line) => info!("[{node_id}] {line}"),
                    RunEvent::Stderr(line) => warn!("[{node_id}] {line}"),
                    RunEvent::Exited { code: Some(0) } => return Ok(()),
                    RunEvent::Exited { code } => {
                        let status = code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
                        return Err(ProvisionError::Run {
                            unit: unit.id.clone(),
                            reason: format!("workload exited with {status}"),
                        });
                    }
                }
            }
            if self.cancel.is_cancelled() {
                Err(ProvisionError::Cancelled)
            } else {
                Err(ProvisionError::Run {
                    unit: unit.id.clone(),
                    reason: "output stream closed without an exit status".to_string(),
                })
            }
        };

        let limit = run_timeout(workload.duration);
        tokio::select! {
            result = tokio::time::timeout(limit, drain) => result.unwrap_or_else(|_| {
                Err(ProvisionError::Timeout {
                    unit: unit.id.clone(),
                    budget: workload.duration,
                })
            }),
            _ = self.cancel.cancelled() => Err(ProvisionError::Cancelled),
        }
    }
}

/// Wall-clock limit for a run with `budget`.
fn run_timeout(budget: SignedDuration) -> std::time::Duration {
    budget.unsigned_abs().mul_f64(RUN_TIMEOUT_FACTOR)
}
