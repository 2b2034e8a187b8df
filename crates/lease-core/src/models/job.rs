//! Job model definition and related functionality.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use super::JobStatus;

/// One bounded-duration slice of a plan's window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Unique identifier for the job
    pub id: u64,

    /// ID of the parent plan
    pub plan_id: u64,

    /// Position of the job within the plan (0-indexed, contiguous)
    pub order_index: u32,

    /// Start of the slice (UTC)
    pub start_at: Timestamp,

    /// Nominal length of the slice
    pub duration: SignedDuration,

    /// Pro-rated share of the plan's invoice amount
    pub invoice_amount: f64,

    /// Execution status of the job
    #[serde(default)]
    pub status: JobStatus,

    /// Error text recorded when the job failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Timestamp when the job was last updated (UTC)
    pub updated_at: Timestamp,
}

/// Duration and invoice amount recomputed for the time left in a job's window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandOff {
    pub duration: SignedDuration,
    pub invoice_amount: f64,
}

impl Job {
    /// End of the slice.
    pub fn end_at(&self) -> Timestamp {
        self.start_at
            .checked_add(self.duration)
            .unwrap_or(Timestamp::MAX)
    }

    /// Time left in the slice at `adjusted_now`. Negative once the slice is over.
    pub fn remaining_at(&self, adjusted_now: Timestamp) -> SignedDuration {
        self.end_at().duration_since(adjusted_now)
    }

    /// Re-prorates the job for dispatch at `adjusted_now`.
    ///
    /// The duration is clamped to `[0, self.duration]`, so dispatching before
    /// the slice starts never asks for (or pays) more than the nominal slice.
    pub fn hand_off(&self, adjusted_now: Timestamp) -> HandOff {
        let duration = self
            .remaining_at(adjusted_now)
            .clamp(SignedDuration::ZERO, self.duration);
        let invoice_amount = if self.duration.is_zero() {
            0.0
        } else {
            duration.as_secs_f64() / self.duration.as_secs_f64() * self.invoice_amount
        };
        HandOff {
            duration,
            invoice_amount,
        }
    }
}
