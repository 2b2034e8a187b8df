//! Job queries: the due set, the chain walk and job status transitions.

use jiff::{SignedDuration, Timestamp};
use rusqlite::{params, types::Type, OptionalExtension};

use super::plan_queries::{timestamp_from_millis, timestamp_from_text};
use crate::{
    error::{DatabaseResultExt, LeaseError, Result},
    models::{DueJob, Job, JobStatus},
};

const JOB_COLUMNS: &str =
    "j.id, j.plan_id, j.order_index, j.start_at, j.duration_ms, j.invoice_amount, j.status, j.last_error, j.updated_at";
const SELECT_JOBS_BY_PLAN_SQL: &str = "SELECT id, plan_id, order_index, start_at, duration_ms, invoice_amount, status, last_error, updated_at FROM jobs WHERE plan_id = ?1 ORDER BY order_index";
const CHECK_JOB_EXISTS_SQL: &str = "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?1)";
const RESET_INTERRUPTED_JOBS_SQL: &str =
    "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE status = ?3";

impl super::Database {
    /// Helper function to construct a Job from a database row, reading its
    /// columns starting at `offset`.
    fn build_job_from_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<Job> {
        let status_str: String = row.get(offset + 6)?;
        let status = status_str.parse::<JobStatus>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                offset + 6,
                Type::Text,
                format!("Invalid job status: {status_str}").into(),
            )
        })?;

        Ok(Job {
            id: row.get::<_, i64>(offset)? as u64,
            plan_id: row.get::<_, i64>(offset + 1)? as u64,
            order_index: row.get::<_, i64>(offset + 2)? as u32,
            start_at: timestamp_from_millis(offset + 3, row.get(offset + 3)?)?,
            duration: SignedDuration::from_millis(row.get(offset + 4)?),
            invoice_amount: row.get(offset + 5)?,
            status,
            last_error: row.get(offset + 7)?,
            updated_at: timestamp_from_text(offset + 8, &row.get::<_, String>(offset + 8)?)?,
        })
    }

    /// Reads `(node_id, compute_class, job)` from a joined plan/job row.
    fn build_chain_row(row: &rusqlite::Row) -> rusqlite::Result<(String, String, Job)> {
        Ok((row.get(0)?, row.get(1)?, Self::build_job_from_row(row, 2)?))
    }

    /// Gets the job chain of a plan, ordered by `order_index`.
    pub fn get_jobs(&self, plan_id: u64) -> Result<Vec<Job>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_JOBS_BY_PLAN_SQL)
            .db_context("Failed to prepare query")?;

        let jobs = stmt
            .query_map(params![plan_id as i64], |row| Self::build_job_from_row(row, 0))
            .db_context("Failed to query jobs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch jobs")?;

        Ok(jobs)
    }

    /// Computes the due set at `adjusted_now`.
    ///
    /// A job is due when its plan is not completed, it has not been
    /// dispatched yet, `adjusted_now` lies strictly inside its slice, and the
    /// time left exceeds `minimum_duration`.
    pub fn query_plans_due(
        &self,
        adjusted_now: Timestamp,
        minimum_duration: SignedDuration,
    ) -> Result<Vec<DueJob>> {
        let sql = format!(
            "SELECT p.node_id, p.compute_class, {JOB_COLUMNS}
             FROM jobs j
             JOIN plans p ON p.id = j.plan_id AND p.status != 'completed'
             WHERE j.status = ?3
               AND ?1 > j.start_at
               AND ?1 < j.start_at + j.duration_ms
               AND j.start_at + j.duration_ms - ?1 > ?2
             ORDER BY j.start_at, j.plan_id"
        );

        let mut stmt = self
            .connection
            .prepare(&sql)
            .db_context("Failed to prepare due query")?;

        let rows = stmt
            .query_map(
                params![
                    adjusted_now.as_millisecond(),
                    minimum_duration.as_millis() as i64,
                    JobStatus::Pending.as_str()
                ],
                Self::build_chain_row,
            )
            .db_context("Failed to query due jobs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .db_context("Failed to fetch due jobs")?;

        Ok(rows
            .into_iter()
            .map(|(node_id, compute_class, job)| {
                DueJob::new(node_id, compute_class, job, adjusted_now)
            })
            .collect())
    }

    /// Looks up the job following `order_index` in a plan that is not yet
    /// completed, prorated at `adjusted_now`.
    pub fn query_next_job(
        &self,
        plan_id: u64,
        order_index: u32,
        adjusted_now: Timestamp,
    ) -> Result<Option<DueJob>> {
        let sql = format!(
            "SELECT p.node_id, p.compute_class, {JOB_COLUMNS}
             FROM jobs j
             JOIN plans p ON p.id = j.plan_id AND p.status != 'completed'
             WHERE j.plan_id = ?1 AND j.order_index = ?2"
        );

        let row = self
            .connection
            .query_row(
                &sql,
                params![plan_id as i64, i64::from(order_index) + 1],
                Self::build_chain_row,
            )
            .optional()
            .db_context("Failed to query next job")?;

        Ok(row.map(|(node_id, compute_class, job)| {
            DueJob::new(node_id, compute_class, job, adjusted_now)
        }))
    }

    /// Moves a job to `status`, recording `error` for failures.
    ///
    /// Returns `false` without touching the row when the job is not in a
    /// state that may move to `status` (for example a finished job).
    pub fn update_job_status(
        &mut self,
        id: u64,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let from: &[JobStatus] = match status {
            JobStatus::Pending => &[JobStatus::Running],
            JobStatus::Running => &[JobStatus::Pending],
            JobStatus::Done | JobStatus::Failed => &[JobStatus::Pending, JobStatus::Running],
        };

        let tx = self
            .connection
            .transaction()
            .db_context("Failed to begin transaction")?;

        let now = Timestamp::now().to_string();
        let rows_affected = tx
            .execute(
                "UPDATE jobs SET status = ?1, last_error = ?2, updated_at = ?3
                 WHERE id = ?4 AND status IN (?5, ?6)",
                params![
                    status.as_str(),
                    error,
                    &now,
                    id as i64,
                    from[0].as_str(),
                    from[from.len() - 1].as_str()
                ],
            )
            .db_context("Failed to update job status")?;

        if rows_affected == 0 {
            let exists: bool = tx
                .query_row(CHECK_JOB_EXISTS_SQL, params![id as i64], |row| row.get(0))
                .db_context("Failed to check job existence")?;

            if !exists {
                return Err(LeaseError::JobNotFound { id });
            }
        }

        tx.commit().db_context("Failed to commit transaction")?;

        Ok(rows_affected > 0)
    }

    /// Returns jobs left `running` by a previous process to `pending`.
    pub fn reset_interrupted_jobs(&mut self) -> Result<usize> {
        let now = Timestamp::now().to_string();
        self.connection
            .execute(
                RESET_INTERRUPTED_JOBS_SQL,
                params![
                    JobStatus::Pending.as_str(),
                    &now,
                    JobStatus::Running.as_str()
                ],
            )
            .db_context("Failed to reset interrupted jobs")
    }
}
