//! Plan importer: turns pending allocation-window batches into plans and
//! job chains.
//!
//! Every batch is handled on its own:
//!
//! ```text
//! pending/x.csv ──parse──▶ windows ──filter(min)──▶ slice ──tx──▶ plans + jobs
//!       │                                                     │
//!       └──────────── failed/x.csv ◀── any error ─────────────┤
//!                     imported/x.csv ◀── commit ──────────────┘
//! ```

use log::{error, info, warn};
use tokio::task;

use crate::{
    config::SliceLimits,
    error::{LeaseError, Result},
    ingest::{Batch, BatchOutcome, Inbox},
    models::{AllocationWindow, PlannedWindow},
    store::Store,
};

pub mod slicing;


pub use slicing::{is_plannable, slice_window};

/// Totals for one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub batches_imported: usize,
    pub batches_failed: usize,
    pub plans_created: usize,
    pub jobs_created: usize,
    /// Windows discarded for being shorter than the minimum duration
    pub windows_skipped: usize,
    /// Batches found in `pending/` although their plans were already
    /// stored; they are moved to `imported/` without writing anything
    pub batches_already_imported: usize,
}

/// Outcome of a single batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct BatchReport {
    plans: usize,
    jobs: usize,
    skipped: usize,
    already_imported: bool,
}

/// Imports pending batches from an inbox into the store.
#[derive(Debug, Clone)]
pub struct PlanImporter {
    store: Store,
    inbox: Inbox,
    limits: SliceLimits,
}

impl PlanImporter {
    pub fn new(store: Store, inbox: Inbox, limits: SliceLimits) -> Self {
        Self {
            store,
            inbox,
            limits,
        }
    }

    /// Imports every pending batch.
    ///
    /// A failing batch is rolled back and moved to `failed/`; the remaining
    /// batches are still processed. Only a failure to list the inbox aborts
    /// the run.
    pub async fn import_plans(&self) -> Result<ImportReport> {
        let inbox = self.inbox.clone();
        let batches = task::spawn_blocking(move || inbox.pending_batches())
            .await
            .map_err(|e| LeaseError::join(&e))??;

        let mut report = ImportReport::default();
        for batch in batches {
            match self.import_batch(&batch).await {
                Ok(batch_report) if batch_report.already_imported => {
                    warn!(
                        "Batch {} was already imported, moving it without importing again",
                        batch.name
                    );
                    report.batches_already_imported += 1;
                    self.settle(batch, BatchOutcome::Imported).await;
                }
                Ok(batch_report) => {
                    info!(
                        "Imported batch {}: {} plans, {} jobs, {} windows below minimum duration",
                        batch.name, batch_report.plans, batch_report.jobs, batch_report.skipped
                    );
                    report.batches_imported += 1;
                    report.plans_created += batch_report.plans;
                    report.jobs_created += batch_report.jobs;
                    report.windows_skipped += batch_report.skipped;
                    self.settle(batch, BatchOutcome::Imported).await;
                }
                Err(e) => {
                    error!("Failed to import batch {}: {e}", batch.name);
                    report.batches_failed += 1;
                    self.settle(batch, BatchOutcome::Failed).await;
                }
            }
        }

        Ok(report)
    }

    async fn import_batch(&self, batch: &Batch) -> Result<BatchReport> {
        let inbox = self.inbox.clone();
        let to_read = batch.clone();
        let windows = task::spawn_blocking(move || inbox.read_windows(&to_read))
            .await
            .map_err(|e| LeaseError::join(&e))??;

        let (plans, skipped) = self.plan_windows(windows);
        let imported = self.store.import_batch(batch.name.clone(), plans).await?;

        Ok(BatchReport {
            plans: imported.plan_ids.len(),
            jobs: imported.jobs,
            skipped,
            already_imported: imported.already_imported,
        })
    }

    /// Drops windows below the minimum and slices the rest.
    fn plan_windows(
        &self,
        windows: Vec<AllocationWindow>,
    ) -> (Vec<PlannedWindow>, usize) {
        let total = windows.len();
        let plans: Vec<_> = windows
            .into_iter()
            .filter(|window| is_plannable(window, self.limits))
            .map(|window| {
                let slices = slice_window(&window, self.limits);
                (window, slices)
            })
            .collect();
        let skipped = total - plans.len();
        (plans, skipped)
    }

    /// Moves a batch to its terminal directory. A failed move is logged: the
    /// batch then stays pending and the next run finds it recorded in the
    /// store, so it is moved then without a second import.
    async fn settle(&self, batch: Batch, outcome: BatchOutcome) {
        let inbox = self.inbox.clone();
        let name = batch.name.clone();
        let moved = task::spawn_blocking(move || match outcome {
            BatchOutcome::Imported => inbox.mark_imported(&batch),
            BatchOutcome::Failed => inbox.mark_failed(&batch),
        })
            .await
            .map_err(|e| LeaseError::join(&e))
            .and_then(|r| r);

        if let Err(e) = moved {
            warn!("Failed to move batch {name} to {outcome:?}: {e}");
        }
    }
}
