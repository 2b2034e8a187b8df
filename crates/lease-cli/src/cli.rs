//! Command handlers
//!
//! Each handler calls into `lease_core` and hands the markdown `Display`
//! output to the renderer.

use std::{future::Future, sync::Arc};

use anyhow::{Context, Result};
use jiff::Timestamp;
use lease_core::{
    ingest::Inbox, provision, Config, DueJobs, PlanImporter, Plans, Scheduler, Store,
    SystemClock,
};
use log::info;

use crate::{
    args::{DueArgs, ListPlansArgs, PlansCommands, ShowPlanArgs},
    renderer::TerminalRenderer,
};

pub struct Cli {
    config: Config,
    store: Store,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(config: Config, store: Store, renderer: TerminalRenderer) -> Self {
        Self {
            config,
            store,
            renderer,
        }
    }

    /// Runs the scheduler until `signal` resolves. The scheduler closes the
    /// store on its way out.
    pub async fn run<S>(&self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        info!("Scheduler starting");
        self.scheduler()?
            .run(signal)
            .await
            .context("Scheduler stopped with an error")
    }

    /// Imports and polls once, waiting for the plans it started.
    pub async fn poll<S>(&self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let (imported, polled) = self
            .scheduler()?
            .run_once(signal)
            .await
            .context("Poll failed")?;

        self.renderer.show(&imported);
        self.renderer.show(&polled);
        Ok(())
    }

    /// Imports pending batches without starting anything.
    pub async fn import(&self) -> Result<()> {
        let inbox = self.inbox()?;
        inbox
            .ensure_layout()
            .context("Failed to prepare the inbox")?;

        let importer = PlanImporter::new(self.store.clone(), inbox, self.config.slice_limits());
        let report = importer.import_plans().await.context("Import failed")?;

        self.renderer.show(&report);
        Ok(())
    }

    /// Shows the jobs that would be started at the given instant.
    pub async fn due(&self, args: DueArgs) -> Result<()> {
        let now = args.at.unwrap_or_else(Timestamp::now);
        let adjusted = now
            .checked_sub(self.config.time_lag)
            .context("Instant out of range")?;

        let due = self
            .store
            .query_plans_due(adjusted, self.config.minimum_duration)
            .await
            .context("Failed to query due jobs")?;

        self.renderer.show(&DueJobs(due));
        Ok(())
    }

    pub async fn handle_plans_command(&self, command: PlansCommands) -> Result<()> {
        match command {
            PlansCommands::List(args) => self.list_plans(args).await,
            PlansCommands::Show(args) => self.show_plan(args).await,
        }
    }

    pub async fn list_plans(&self, args: ListPlansArgs) -> Result<()> {
        let plans = self
            .store
            .list_plans(args.status.map(Into::into))
            .await
            .context("Failed to list plans")?;

        self.renderer.show(&Plans(plans));
        Ok(())
    }

    async fn show_plan(&self, args: ShowPlanArgs) -> Result<()> {
        let plan = self
            .store
            .get_plan(args.id)
            .await
            .context("Failed to get plan")?
            .with_context(|| format!("Plan with ID {} not found", args.id))?;

        self.renderer.show(&plan);
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.store.close().await.context("Failed to close database")
    }

    fn inbox(&self) -> Result<Inbox> {
        Ok(Inbox::new(self.config.inbox_dir()?))
    }

    fn scheduler(&self) -> Result<Scheduler> {
        let provisioner = provision::from_config(&self.config.provisioner)
            .context("Failed to set up the provisioner")?;

        Ok(Scheduler::new(
            self.config.clone(),
            self.store.clone(),
            self.inbox()?,
            provisioner,
            Arc::new(SystemClock),
        ))
    }
}

/// Prints the effective configuration, overrides included.
pub fn show_config(config: &Config) -> Result<()> {
    let text = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    print!("{text}");
    Ok(())
}
