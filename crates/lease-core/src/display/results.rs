//! Display implementations for import and poll reports.

use std::fmt;

use crate::{importer::ImportReport, monitor::PollReport};

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Import")?;
        writeln!(f)?;
        writeln!(
            f,
            "- **Batches**: {} imported, {} failed",
            self.batches_imported, self.batches_failed
        )?;
        writeln!(
            f,
            "- **Created**: {} plans, {} jobs",
            self.plans_created, self.jobs_created
        )?;
        if self.windows_skipped > 0 {
            writeln!(
                f,
                "- **Skipped**: {} windows below the minimum duration",
                self.windows_skipped
            )?;
        }
        if self.batches_already_imported > 0 {
            writeln!(
                f,
                "- **Already imported**: {} batches moved without importing",
                self.batches_already_imported
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for PollReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Poll")?;
        writeln!(f)?;
        writeln!(f, "- **Due**: {}", self.due)?;
        writeln!(f, "- **Activated**: {}", self.activated)?;
        writeln!(f, "- **Skipped (node busy)**: {}", self.skipped)
    }
}
