//! Markdown formatting of plans, jobs and scheduler reports.
//!
//! Domain models implement [`std::fmt::Display`] directly (see [`models`]);
//! collections are wrapped in newtypes (see [`collections`]) so an empty list
//! renders a message instead of nothing. All output is markdown, rendered in
//! the terminal by the CLI.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │ Newtypes and    │    │   Markdown      │
//! │  (Plan, Job)    │───▶│ Report Display  │───▶│   (terminal)    │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! ```rust
//! use lease_core::{display::Plans, models::Plan};
//!
//! let plans: Vec<Plan> = Vec::new();
//! assert_eq!(Plans(plans).to_string(), "No plans found.\n");
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;

pub use collections::{DueJobs, Plans};
pub use datetime::{LocalDateTime, Span};
