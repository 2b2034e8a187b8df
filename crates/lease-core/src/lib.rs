//! Core library for the lease allocation-window scheduler.
//!
//! Allocation windows (a node may use a compute class between two instants
//! for a given invoice amount) arrive as CSV batches. The scheduler turns
//! them into job chains and runs each chain on a provisioning backend while
//! the window is open:
//!
//! - **Plan importer** ([`importer`]): parses pending batches from the
//!   [`ingest::Inbox`], cuts each window into bounded jobs and persists them
//!   atomically per batch
//! - **Due-job monitor** ([`monitor`]): finds jobs whose slice contains the
//!   lag-adjusted present and starts one executor per idle node
//! - **Plan executor** ([`executor`]): walks a plan's chain job by job,
//!   re-prorating each one at dispatch time
//!
//! [`scheduler::Scheduler`] wires the three together with timers and an
//! ordered shutdown. Persistence lives in [`store::Store`] (SQLite through
//! rusqlite), backends behind the [`provision::Provisioner`] trait.
//!
//! # Quick Start
//!
//! ```rust
//! use lease_core::{ingest::Inbox, Config, PlanImporter, StoreBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let store = StoreBuilder::new()
//!     .with_database_path(Some("lease.db"))
//!     .build()
//!     .await?;
//!
//! let importer = PlanImporter::new(store.clone(), Inbox::new("inbox"), config.slice_limits());
//! let report = importer.import_plans().await?;
//! println!("{report}");
//!
//! for plan in store.list_plans(None).await? {
//!     println!("{plan}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod executor;
pub mod importer;
pub mod ingest;
pub mod models;
pub mod monitor;
pub mod provision;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use clock::{Clock, SharedClock, SystemClock};
pub use config::{Config, ProvisionerConfig, ProvisionerKind, SliceLimits};
pub use db::{BatchImport, Database};
pub use display::{DueJobs, LocalDateTime, Plans};
pub use error::{LeaseError, Result};
pub use executor::{ExecutorSettings, PlanEnd, PlanExecutor, PlanOutcome};
pub use importer::{ImportReport, PlanImporter};
pub use models::{DueJob, Job, JobStatus, Plan, PlanStatus};
pub use monitor::{DueJobMonitor, PollReport};
pub use provision::{Provisioner, SharedProvisioner};
pub use registry::NodeRegistry;
pub use scheduler::Scheduler;
pub use shutdown::{Cancellation, Shutdown};
pub use store::{Store, StoreBuilder};
