#![allow(dead_code)]

use jiff::{SignedDuration, Timestamp};
use lease_core::{
    importer::slice_window,
    models::{AllocationWindow, PlannedWindow},
    SliceLimits, Store, StoreBuilder,
};
use tempfile::TempDir;

pub const HEADER: &str = "node_id,start_at,stop_at,invoice_amount,compute_class\n";

/// Helper function to create a test store
pub async fn create_test_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let store = StoreBuilder::new()
        .with_database_path(Some(&db_path))
        .build()
        .await
        .expect("Failed to create store");
    (temp_dir, store)
}

pub fn base() -> Timestamp {
    "2024-03-01T00:00:00Z".parse::<Timestamp>().unwrap()
}

pub fn at(minutes: i64) -> Timestamp {
    base() + SignedDuration::from_mins(minutes)
}

pub fn limits() -> SliceLimits {
    SliceLimits {
        minimum: SignedDuration::from_mins(5),
        maximum: SignedDuration::from_mins(60),
    }
}

/// Window over `[at(start), at(stop))` paying one unit per minute, sliced.
pub fn planned(node_id: &str, start: i64, stop: i64) -> PlannedWindow {
    let window = AllocationWindow {
        node_id: node_id.to_string(),
        start_at: at(start),
        stop_at: at(stop),
        invoice_amount: (stop - start) as f64,
        compute_class: "gpu-small".to_string(),
    };
    let slices = slice_window(&window, limits());
    (window, slices)
}

/// CSV row for a window over `[at(start), at(stop))`.
pub fn csv_row(node_id: &str, start: i64, stop: i64) -> String {
    format!(
        "{node_id},{},{},{},gpu-small\n",
        at(start),
        at(stop),
        (stop - start) as f64
    )
}
