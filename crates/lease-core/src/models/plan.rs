//! Plan model definition and related functionality.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use super::{Job, PlanStatus};

/// One allocation window for one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Unique identifier for the plan
    pub id: u64,

    /// Node the window is reserved on
    pub node_id: String,

    /// Batch the plan was imported from
    pub source: String,

    /// Start of the reserved window (UTC)
    pub start_at: Timestamp,

    /// End of the reserved window (UTC)
    pub stop_at: Timestamp,

    /// Compute-class tag requested from the provisioner
    pub compute_class: String,

    /// Invoice amount for the whole window
    pub invoice_amount: f64,

    /// Lifecycle status of the plan
    #[serde(default)]
    pub status: PlanStatus,

    /// Timestamp when the plan was imported (UTC)
    pub created_at: Timestamp,

    /// Timestamp when the plan was last modified (UTC)
    pub updated_at: Timestamp,

    /// Job chain, ordered by `order_index` (lazy-loaded by default)
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Plan {
    /// Length of the reserved window.
    pub fn window(&self) -> SignedDuration {
        self.stop_at.duration_since(self.start_at)
    }
}
