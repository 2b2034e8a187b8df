//! Async store shared by the importer, the monitor and the executors.
//!
//! Each operation opens its own SQLite connection on a blocking thread, so
//! concurrent plan executors never contend for one connection handle. SQLite
//! itself serializes writers; WAL mode lets readers proceed meanwhile.

use std::path::{Path, PathBuf};

use jiff::{SignedDuration, Timestamp};
use tokio::task;

use crate::{
    db::{BatchImport, Database},
    error::{LeaseError, Result},
    models::{DueJob, JobStatus, Plan, PlanStatus, PlannedWindow},
};

pub mod builder;


pub use builder::StoreBuilder;

/// Handle to the persisted plans and jobs.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
}

impl Store {
    pub(crate) fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    /// Runs `operation` against a fresh connection on the blocking pool.
    async fn with_database<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
    {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let mut db = Database::new(&db_path)?;
            operation(&mut db)
        })
        .await
        .map_err(|e| LeaseError::join(&e))?
    }

    /// Persists all plans and jobs of one batch atomically.
    pub async fn import_batch(
        &self,
        source: String,
        plans: Vec<PlannedWindow>,
    ) -> Result<BatchImport> {
        self.with_database(move |db| db.import_batch(&source, &plans))
            .await
    }

    /// Jobs due at `adjusted_now` with more than `minimum_duration` left.
    pub async fn query_plans_due(
        &self,
        adjusted_now: Timestamp,
        minimum_duration: SignedDuration,
    ) -> Result<Vec<DueJob>> {
        self.with_database(move |db| db.query_plans_due(adjusted_now, minimum_duration))
            .await
    }

    /// The job after `order_index` in a non-completed plan, if any.
    pub async fn query_next_job(
        &self,
        plan_id: u64,
        order_index: u32,
        adjusted_now: Timestamp,
    ) -> Result<Option<DueJob>> {
        self.with_database(move |db| db.query_next_job(plan_id, order_index, adjusted_now))
            .await
    }

    /// Conditional, idempotent forward transition of a plan.
    pub async fn update_plan_status(&self, plan_id: u64, status: PlanStatus) -> Result<bool> {
        self.with_database(move |db| db.update_plan_status(plan_id, status))
            .await
    }

    pub async fn update_job_status(
        &self,
        job_id: u64,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<bool> {
        self.with_database(move |db| db.update_job_status(job_id, status, error.as_deref()))
            .await
    }

    /// Resets jobs a crashed process left `running`.
    pub async fn reset_interrupted_jobs(&self) -> Result<usize> {
        self.with_database(Database::reset_interrupted_jobs).await
    }

    /// Retrieves a plan with its jobs.
    pub async fn get_plan(&self, plan_id: u64) -> Result<Option<Plan>> {
        self.with_database(move |db| db.get_plan(plan_id)).await
    }

    /// Lists plans with their jobs, optionally filtered by status.
    pub async fn list_plans(&self, status: Option<PlanStatus>) -> Result<Vec<Plan>> {
        self.with_database(move |db| db.list_plans(status)).await
    }

    /// Checkpoints and closes the database cleanly.
    pub async fn close(&self) -> Result<()> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || Database::new(&db_path)?.close())
            .await
            .map_err(|e| LeaseError::join(&e))?
    }
}
