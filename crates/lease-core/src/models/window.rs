//! Allocation windows read from ingestion batches and the job slices cut from them.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

/// A reservation of one node for a time range, with its invoice amount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationWindow {
    pub node_id: String,
    pub start_at: Timestamp,
    pub stop_at: Timestamp,
    pub invoice_amount: f64,
    pub compute_class: String,
}

impl AllocationWindow {
    /// Total length of the window (`stop - start`).
    pub fn total_duration(&self) -> SignedDuration {
        self.stop_at.duration_since(self.start_at)
    }
}

/// A job about to be persisted for a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobSlice {
    pub order_index: u32,
    pub start_at: Timestamp,
    pub duration: SignedDuration,
    pub invoice_amount: f64,
}

/// A window that passed the minimum-duration filter, with its slices.
pub type PlannedWindow = (AllocationWindow, Vec<JobSlice>);
