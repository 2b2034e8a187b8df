//! Display implementations for domain models.

use std::fmt;

use super::datetime::{LocalDateTime, Span};
use crate::models::{DueJob, Job, JobStatus, Plan, PlanStatus};

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let finished = self.jobs.iter().filter(|j| j.status.is_terminal()).count();
        writeln!(
            f,
            "## Plan {} · {} ({}/{})",
            self.id,
            self.node_id,
            finished,
            self.jobs.len()
        )?;
        writeln!(f)?;

        writeln!(f, "- **Status**: {}", self.status)?;
        writeln!(f, "- **Compute class**: {}", self.compute_class)?;
        writeln!(
            f,
            "- **Window**: {} → {} ({})",
            LocalDateTime(&self.start_at),
            LocalDateTime(&self.stop_at),
            Span(self.window())
        )?;
        writeln!(f, "- **Invoice**: {:.2}", self.invoice_amount)?;
        writeln!(f, "- **Source**: {}", self.source)?;
        writeln!(f)?;

        if self.jobs.is_empty() {
            writeln!(f, "No jobs in this plan.")?;
            writeln!(f)?;
            return Ok(());
        }

        for job in &self.jobs {
            write!(f, "{job}")?;
        }
        writeln!(f)?;

        Ok(())
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}. {} · {} for {} · {:.2}",
            self.order_index + 1,
            self.status.with_icon(),
            LocalDateTime(&self.start_at),
            Span(self.duration),
            self.invoice_amount
        )?;
        if let Some(error) = &self.last_error {
            writeln!(f, "   - _{error}_")?;
        }
        Ok(())
    }
}

impl fmt::Display for DueJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- **{}** plan {} job {}: {} left of {} · {:.2} on {}",
            self.node_id,
            self.plan_id,
            self.order_index(),
            Span(self.adjusted_duration),
            Span(self.job.duration),
            self.adjusted_invoice_amount,
            self.compute_class
        )
    }
}
