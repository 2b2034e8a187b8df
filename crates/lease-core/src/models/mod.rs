//! Data models for plans, jobs and allocation windows.
//!
//! Display implementations for these models are located in
//! [`crate::display::models`] to keep presentation out of the data
//! structures.
//!
//! # Examples
//!
//! ```rust
//! use jiff::{SignedDuration, Timestamp};
//! use lease_core::models::{Job, JobStatus};
//!
//! let start = Timestamp::from_second(1_700_000_000).unwrap();
//! let job = Job {
//!     id: 1,
//!     plan_id: 1,
//!     order_index: 0,
//!     start_at: start,
//!     duration: SignedDuration::from_mins(60),
//!     invoice_amount: 6.0,
//!     status: JobStatus::Pending,
//!     last_error: None,
//!     updated_at: start,
//! };
//!
//! // Dispatching 45 minutes in leaves a quarter of the slice and its amount.
//! let hand_off = job.hand_off(start + SignedDuration::from_mins(45));
//! assert_eq!(hand_off.duration, SignedDuration::from_mins(15));
//! assert!((hand_off.invoice_amount - 1.5).abs() < 1e-9);
//! ```

pub mod due;
pub mod job;
pub mod plan;
pub mod status;
pub mod window;

#[cfg(test)]
mod tests;

pub use due::DueJob;
pub use job::{HandOff, Job};
pub use plan::Plan;
pub use status::{JobStatus, PlanStatus};
pub use window::{AllocationWindow, JobSlice, PlannedWindow};
