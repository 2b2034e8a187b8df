//! Fixtures shared by the unit tests of the scheduling modules.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use jiff::{SignedDuration, Timestamp};
use tempfile::TempDir;

use crate::{
    clock::FakeClock,
    config::SliceLimits,
    executor::{ExecutorSettings, PlanExecutor},
    importer::slice_window,
    models::{AllocationWindow, PlannedWindow},
    provision::FakeProvisioner,
    shutdown::Cancellation,
    store::{Store, StoreBuilder},
};

pub(crate) const LAG: SignedDuration = SignedDuration::from_mins(1);

/// Batch names must be unique or the store skips the import
static NEXT_BATCH: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn base() -> Timestamp {
    "2024-03-01T00:00:00Z".parse::<Timestamp>().unwrap()
}

/// Instant `minutes` after the base, as the allocation source sees it.
pub(crate) fn at(minutes: i64) -> Timestamp {
    base() + SignedDuration::from_mins(minutes)
}

/// Wall-clock reading whose adjusted time is `at(minutes)`.
pub(crate) fn wall(minutes: i64) -> Timestamp {
    at(minutes) + LAG
}

pub(crate) fn limits() -> SliceLimits {
    SliceLimits {
        minimum: SignedDuration::from_mins(5),
        maximum: SignedDuration::from_mins(60),
    }
}

pub(crate) fn settings() -> ExecutorSettings {
    ExecutorSettings {
        time_lag: LAG,
        minimum_duration: SignedDuration::from_mins(5),
        image: "alpine:latest".to_string(),
    }
}

pub(crate) fn window(node_id: &str, start: Timestamp, stop: Timestamp, amount: f64) -> AllocationWindow {
    AllocationWindow {
        node_id: node_id.to_string(),
        start_at: start,
        stop_at: stop,
        invoice_amount: amount,
        compute_class: "gpu-small".to_string(),
    }
}

pub(crate) fn planned_with(window: AllocationWindow, limits: SliceLimits) -> PlannedWindow {
    let slices = slice_window(&window, limits);
    (window, slices)
}

/// A plan over `[at(start), at(stop))` with one invoice unit per minute.
pub(crate) fn planned(node_id: &str, start: i64, stop: i64) -> PlannedWindow {
    planned_with(
        window(node_id, at(start), at(stop), (stop - start) as f64),
        limits(),
    )
}

pub(crate) struct TestEnv {
    pub store: Store,
    pub clock: FakeClock,
    pub provisioner: FakeProvisioner,
    _temp_dir: TempDir,
}

impl TestEnv {
    /// Store in a temp dir, a fake clock at `wall(minutes)` and a fake
    /// provisioner that advances it.
    pub async fn new(minutes: i64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = StoreBuilder::new()
            .with_database_path(Some(temp_dir.path().join("test.db")))
            .build()
            .await
            .expect("Failed to create store");
        let clock = FakeClock::new(wall(minutes));
        let provisioner = FakeProvisioner::new().with_clock(clock.clone());

        Self {
            store,
            clock,
            provisioner,
            _temp_dir: temp_dir,
        }
    }

    /// Swaps in a provisioner that leaves the clock alone.
    pub fn with_still_clock(mut self) -> Self {
        self.provisioner = FakeProvisioner::new();
        self
    }

    pub async fn import(&self, plans: Vec<PlannedWindow>) -> Vec<u64> {
        let source = format!("test-{}.csv", NEXT_BATCH.fetch_add(1, Ordering::Relaxed));
        self.store
            .import_batch(source, plans)
            .await
            .expect("Failed to import")
            .plan_ids
    }

    pub fn executor(&self, settings: ExecutorSettings, cancel: Cancellation) -> PlanExecutor {
        PlanExecutor::new(
            self.store.clone(),
            Arc::new(self.provisioner.clone()),
            Arc::new(self.clock.clone()),
            settings,
            cancel,
        )
    }
}
