//! Due-job monitor: finds jobs whose slice is running now and starts an
//! executor for each node that is not already busy.

use jiff::{SignedDuration, Timestamp};
use log::{error, info};

use crate::{
    clock::SharedClock,
    error::Result,
    executor::PlanExecutor,
    registry::NodeRegistry,
    store::Store,
};


/// Counts for one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Jobs in the due set
    pub due: usize,
    /// Executors started
    pub activated: usize,
    /// Due jobs left alone because their node already has an executor
    pub skipped: usize,
}

/// Periodic due-set scan.
#[derive(Clone)]
pub struct DueJobMonitor {
    store: Store,
    executor: PlanExecutor,
    registry: NodeRegistry,
    clock: SharedClock,
    time_lag: SignedDuration,
    minimum_duration: SignedDuration,
}

impl DueJobMonitor {
    pub fn new(
        store: Store,
        executor: PlanExecutor,
        registry: NodeRegistry,
        clock: SharedClock,
        time_lag: SignedDuration,
        minimum_duration: SignedDuration,
    ) -> Self {
        Self {
            store,
            executor,
            registry,
            clock,
            time_lag,
            minimum_duration,
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Scans the due set once and spawns an executor per idle node.
    ///
    /// Executors run on their own tasks and hold their node's lease until
    /// the chain walk ends; this call does not wait for them.
    pub async fn process_plans(&self) -> Result<PollReport> {
        let adjusted_now = self
            .clock
            .now()
            .checked_sub(self.time_lag)
            .unwrap_or(Timestamp::MIN);
        let due = self
            .store
            .query_plans_due(adjusted_now, self.minimum_duration)
            .await?;

        let mut report = PollReport {
            due: due.len(),
            ..Default::default()
        };

        for due_job in due {
            let Some(lease) = self.registry.try_claim(&due_job.node_id) else {
                info!(
                    "Node {} already has an executor, skipping plan {}",
                    due_job.node_id, due_job.plan_id
                );
                report.skipped += 1;
                continue;
            };

            info!(
                "Activating plan {} for node {} ({:#} left)",
                due_job.plan_id, due_job.node_id, due_job.adjusted_duration
            );
            report.activated += 1;

            let executor = self.executor.clone();
            tokio::spawn(async move {
                let _lease = lease;
                let plan_id = due_job.plan_id;
                let node_id = due_job.node_id.clone();
                if let Err(e) = executor.execute_plan(due_job).await {
                    error!("Plan {plan_id} on node {node_id} aborted: {e}");
                }
            });
        }

        Ok(report)
    }
}
