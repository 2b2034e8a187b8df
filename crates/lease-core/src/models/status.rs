//! Status enumerations for plans and jobs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Type-safe enumeration of plan statuses.
///
/// A plan only ever moves forward: `pending → active → completed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Imported, no job has been dispatched yet
    #[default]
    Pending,

    /// An executor is walking (or has walked part of) the job chain
    Active,

    /// The job chain is exhausted
    Completed,
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PlanStatus::Pending),
            "active" => Ok(PlanStatus::Active),
            "completed" => Ok(PlanStatus::Completed),
            _ => Err(format!("Invalid plan status: {s}")),
        }
    }
}

impl PlanStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
        }
    }

    /// Statuses a plan may be in immediately before moving to `self`.
    pub(crate) fn predecessors(&self) -> &'static [PlanStatus] {
        match self {
            PlanStatus::Pending => &[],
            PlanStatus::Active => &[PlanStatus::Pending],
            PlanStatus::Completed => &[PlanStatus::Pending, PlanStatus::Active],
        }
    }
}

/// Type-safe enumeration of job statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Not dispatched yet
    #[default]
    Pending,

    /// Remote work is in flight
    Running,

    /// Remote work finished successfully
    Done,

    /// Remote work failed or the job was not worth starting
    Failed,
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

impl JobStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Get status with consistent icon formatting for display.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lease_core::models::JobStatus;
    ///
    /// assert_eq!(JobStatus::Done.with_icon(), "✓ Done");
    /// assert_eq!(JobStatus::Running.with_icon(), "➤ Running");
    /// assert_eq!(JobStatus::Pending.with_icon(), "○ Pending");
    /// assert_eq!(JobStatus::Failed.with_icon(), "✗ Failed");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            JobStatus::Done => "✓ Done",
            JobStatus::Running => "➤ Running",
            JobStatus::Pending => "○ Pending",
            JobStatus::Failed => "✗ Failed",
        }
    }
}
