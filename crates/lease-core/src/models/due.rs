//! Rows of the due set and of the chain walk.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use super::Job;

/// A job joined with the plan fields the executor needs, re-prorated at a
/// given instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DueJob {
    pub node_id: String,
    pub compute_class: String,
    pub plan_id: u64,
    pub job: Job,
    pub adjusted_duration: SignedDuration,
    pub adjusted_invoice_amount: f64,
}

impl DueJob {
    /// Builds a row for `job`, prorated at `adjusted_now`.
    pub fn new(node_id: String, compute_class: String, job: Job, adjusted_now: Timestamp) -> Self {
        let hand_off = job.hand_off(adjusted_now);
        Self {
            node_id,
            compute_class,
            plan_id: job.plan_id,
            job,
            adjusted_duration: hand_off.duration,
            adjusted_invoice_amount: hand_off.invoice_amount,
        }
    }

    pub fn order_index(&self) -> u32 {
        self.job.order_index
    }
}
