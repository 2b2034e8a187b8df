//! Checks that CLI output is the core's markdown `Display` output.

use std::process::Command;

use jiff::{SignedDuration, Timestamp};
use lease_core::{
    display::Plans, importer::slice_window, models::AllocationWindow, SliceLimits, Store,
    StoreBuilder,
};
use tempfile::TempDir;

async fn create_test_store() -> (Store, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let store = StoreBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .build()
        .await
        .expect("Failed to create store");
    (store, temp_dir)
}

/// Run a CLI command against `db_path` and capture its output
fn run_cli_command(temp_dir: &TempDir, db_path: &str, args: &[&str]) -> String {
    let output = Command::new(env!("CARGO_BIN_EXE_lease"))
        .env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .env("RUST_LOG", "off")
        .arg("--no-color")
        .arg("--database-file")
        .arg(db_path)
        .args(args)
        .output()
        .expect("Failed to run CLI command");
    assert!(output.status.success(), "lease {args:?} failed");
    String::from_utf8(output.stdout).expect("Invalid UTF-8 in CLI output")
}

async fn seed(store: &Store) -> u64 {
    let start: Timestamp = "2024-03-01T00:00:00Z".parse().unwrap();
    let window = AllocationWindow {
        node_id: "node-a".to_string(),
        start_at: start,
        stop_at: start + SignedDuration::from_mins(90),
        invoice_amount: 90.0,
        compute_class: "gpu-small".to_string(),
    };
    let limits = SliceLimits {
        minimum: SignedDuration::from_mins(5),
        maximum: SignedDuration::from_mins(60),
    };
    let slices = slice_window(&window, limits);
    store
        .import_batch("seed.csv".to_string(), vec![(window, slices)])
        .await
        .expect("Failed to seed store")
        .plan_ids[0]
}

#[tokio::test]
async fn test_show_plan_matches_display() {
    let (store, temp_dir) = create_test_store().await;
    let plan_id = seed(&store).await;
    let db_path = store.database_path().to_string_lossy().into_owned();

    let plan = store.get_plan(plan_id).await.unwrap().unwrap();
    store.close().await.unwrap();

    let output = run_cli_command(&temp_dir, &db_path, &["plans", "show", &plan_id.to_string()]);
    assert_eq!(output, plan.to_string());
}

#[tokio::test]
async fn test_list_plans_matches_display() {
    let (store, temp_dir) = create_test_store().await;
    seed(&store).await;
    let db_path = store.database_path().to_string_lossy().into_owned();

    let plans = store.list_plans(None).await.unwrap();
    store.close().await.unwrap();

    let output = run_cli_command(&temp_dir, &db_path, &["plans", "list"]);
    assert_eq!(output, Plans(plans).to_string());
}
