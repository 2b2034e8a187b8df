//! Transactional bulk insert of plans and their job chains.

use jiff::Timestamp;
use rusqlite::{params, Transaction};

use crate::{
    error::{DatabaseResultExt, Result},
    models::{AllocationWindow, JobSlice, PlanStatus, PlannedWindow},
};

const INSERT_PLAN_SQL: &str = "INSERT INTO plans (node_id, source, start_at, stop_at, compute_class, invoice_amount, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
const INSERT_JOB_SQL: &str = "INSERT INTO jobs (plan_id, order_index, start_at, duration_ms, invoice_amount, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const RECORD_BATCH_SQL: &str = "INSERT OR IGNORE INTO batches (name, plans, jobs, imported_at) VALUES (?1, 0, 0, ?2)";
const COUNT_BATCH_SQL: &str = "UPDATE batches SET plans = ?2, jobs = ?3 WHERE name = ?1";

/// Rows written for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchImport {
    /// IDs of the plans created, in batch order
    pub plan_ids: Vec<u64>,
    /// Number of jobs created across all plans
    pub jobs: usize,
    /// The batch had been imported before; nothing was written
    pub already_imported: bool,
}

impl super::Database {
    /// Inserts every plan of a batch with its job chain in one transaction.
    ///
    /// Either all rows are written or, on the first error, none are: the
    /// transaction is rolled back when it is dropped without a commit.
    ///
    /// The batch name is recorded in the same transaction. A name that is
    /// already recorded writes nothing and reports `already_imported`.
    pub fn import_batch(
        &mut self,
        source: &str,
        plans: &[PlannedWindow],
    ) -> Result<BatchImport> {
        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let now = Timestamp::now().to_string();
        let mut imported = BatchImport::default();

        let recorded = tx
            .execute(RECORD_BATCH_SQL, params![source, now])
            .db_context("Failed to record batch")?;
        if recorded == 0 {
            imported.already_imported = true;
            return Ok(imported);
        }

        for (window, slices) in plans {
            let plan_id = Self::insert_plan(&tx, source, window, &now)?;
            for slice in slices {
                Self::insert_job(&tx, plan_id, slice, &now)?;
            }
            imported.plan_ids.push(plan_id);
            imported.jobs += slices.len();
        }

        tx.execute(
            COUNT_BATCH_SQL,
            params![source, imported.plan_ids.len() as i64, imported.jobs as i64],
        )
        .db_context("Failed to record batch totals")?;

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(imported)
    }

    fn insert_plan(
        tx: &Transaction,
        source: &str,
        window: &AllocationWindow,
        now: &str,
    ) -> Result<u64> {
        tx.execute(
            INSERT_PLAN_SQL,
            params![
                window.node_id,
                source,
                window.start_at.as_millisecond(),
                window.stop_at.as_millisecond(),
                window.compute_class,
                window.invoice_amount,
                PlanStatus::Pending.as_str(),
                now,
                now
            ],
        )
        .db_context("Failed to insert plan")?;

        Ok(tx.last_insert_rowid() as u64)
    }

    fn insert_job(tx: &Transaction, plan_id: u64, slice: &JobSlice, now: &str) -> Result<()> {
        tx.execute(
            INSERT_JOB_SQL,
            params![
                plan_id as i64,
                i64::from(slice.order_index),
                slice.start_at.as_millisecond(),
                slice.duration.as_millis() as i64,
                slice.invoice_amount,
                now
            ],
        )
        .db_context("Failed to insert job")?;

        Ok(())
    }
}
