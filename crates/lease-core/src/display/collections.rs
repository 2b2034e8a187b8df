//! Newtype wrappers for displaying groups of domain objects.

use std::{fmt, ops::Deref};

use crate::models::{DueJob, Plan};

/// Newtype wrapper for displaying a list of plans with their jobs.
pub struct Plans(pub Vec<Plan>);

impl Deref for Plans {
    type Target = [Plan];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Plans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No plans found.");
        }
        for plan in &self.0 {
            write!(f, "{plan}")?;
        }
        Ok(())
    }
}

/// Newtype wrapper for displaying a due set.
pub struct DueJobs(pub Vec<DueJob>);

impl Deref for DueJobs {
    type Target = [DueJob];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for DueJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No jobs are due.");
        }
        writeln!(f, "# Due jobs")?;
        writeln!(f)?;
        for due in &self.0 {
            write!(f, "{due}")?;
        }
        Ok(())
    }
}
