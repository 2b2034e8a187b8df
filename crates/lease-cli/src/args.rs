//! Command-line arguments.
//!
//! Flags that overlap the configuration file (`--database-file`,
//! `--inbox-dir`) override it; everything else comes from the file or the
//! built-in defaults.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use jiff::Timestamp;
use lease_core::PlanStatus;

/// Scheduler for time-bounded compute rental jobs
///
/// Allocation windows dropped as CSV batches into the inbox's `pending/`
/// directory are cut into jobs of bounded length. While a window is open,
/// its jobs run one after another on the configured provisioning backend.
#[derive(Parser)]
#[command(version, about, name = "lease")]
pub struct Args {
    /// Configuration file. Defaults to $XDG_CONFIG_HOME/lease/config.toml
    /// when it exists
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/lease/lease.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Root of the batch inbox. Defaults to $XDG_DATA_HOME/lease/inbox
    #[arg(long, global = true)]
    pub inbox_dir: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
///
/// Without a command, `lease` lists the stored plans.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Run,
    /// Import pending batches once
    Import,
    /// Import, start every due plan and wait for them to finish
    Poll,
    /// Show the jobs that are due, without running them
    Due(DueArgs),
    /// Inspect stored plans
    #[command(alias = "p")]
    Plans {
        #[command(subcommand)]
        command: PlansCommands,
    },
    /// Print the effective configuration as TOML
    #[command(name = "config")]
    ShowConfig,
}

#[derive(ClapArgs)]
pub struct DueArgs {
    /// Evaluate the due set at this instant (RFC 3339) instead of now; the
    /// configured time lag still applies
    #[arg(long)]
    pub at: Option<Timestamp>,
}

#[derive(Subcommand)]
pub enum PlansCommands {
    /// List plans, newest window first
    #[command(alias = "ls")]
    List(ListPlansArgs),
    /// Show one plan with its jobs
    Show(ShowPlanArgs),
}

#[derive(ClapArgs)]
pub struct ListPlansArgs {
    /// Only list plans in this status
    #[arg(long, value_enum)]
    pub status: Option<StatusArg>,
}

#[derive(ClapArgs)]
pub struct ShowPlanArgs {
    /// ID of the plan
    pub id: u64,
}

/// Plan status as accepted on the command line
#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Active,
    Completed,
}

impl From<StatusArg> for PlanStatus {
    fn from(val: StatusArg) -> Self {
        match val {
            StatusArg::Pending => PlanStatus::Pending,
            StatusArg::Active => PlanStatus::Active,
            StatusArg::Completed => PlanStatus::Completed,
        }
    }
}
