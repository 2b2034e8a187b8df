//! The long-running scheduler: periodic import and due-job polling, plus the
//! ordered shutdown that follows.

use std::future::Future;

use log::{error, info, warn};
use tokio::{
    task,
    time::{self, MissedTickBehavior},
};

use crate::{
    clock::SharedClock,
    config::Config,
    error::{LeaseError, Result},
    executor::{ExecutorSettings, PlanExecutor},
    importer::{ImportReport, PlanImporter},
    ingest::Inbox,
    monitor::{DueJobMonitor, PollReport},
    provision::SharedProvisioner,
    registry::NodeRegistry,
    shutdown::Shutdown,
    store::Store,
};

/// Everything the scheduler loop drives.
pub struct Scheduler {
    config: Config,
    store: Store,
    provisioner: SharedProvisioner,
    importer: PlanImporter,
    monitor: DueJobMonitor,
    inbox: Inbox,
    registry: NodeRegistry,
    shutdown: Shutdown,
}

impl Scheduler {
    pub fn new(
        config: Config,
        store: Store,
        inbox: Inbox,
        provisioner: SharedProvisioner,
        clock: SharedClock,
    ) -> Self {
        let shutdown = Shutdown::new();
        let registry = NodeRegistry::new();
        let executor = PlanExecutor::new(
            store.clone(),
            provisioner.clone(),
            clock.clone(),
            ExecutorSettings::from(&config),
            shutdown.cancellation(),
        );
        let monitor = DueJobMonitor::new(
            store.clone(),
            executor,
            registry.clone(),
            clock,
            config.time_lag,
            config.minimum_duration,
        );
        let importer = PlanImporter::new(store.clone(), inbox.clone(), config.slice_limits());

        Self {
            config,
            store,
            provisioner,
            importer,
            monitor,
            inbox,
            registry,
            shutdown,
        }
    }

    /// One import and one poll, then waits for the started executors (or
    /// `signal`) before shutting down like [`run`](Self::run).
    pub async fn run_once<S>(self, signal: S) -> Result<(ImportReport, PollReport)>
    where
        S: Future<Output = ()> + Send,
    {
        self.start().await?;

        let imported = self.importer.import_plans().await;
        let polled = match &imported {
            Ok(_) => self.monitor.process_plans().await,
            Err(_) => Ok(PollReport::default()),
        };

        tokio::select! {
            _ = self.registry.wait_idle() => {}
            _ = signal => info!("Interrupted, stopping executors"),
        }

        self.stop().await?;
        Ok((imported?, polled?))
    }

    /// Runs until `signal` resolves, then shuts down in order: stop the
    /// timers, cancel executors, wait for them up to the grace period,
    /// disconnect the provisioner, close the store.
    ///
    /// # Errors
    ///
    /// Fails if startup fails or if the store cannot be closed cleanly.
    /// Errors of individual import or poll rounds are logged and the loop
    /// keeps going.
    pub async fn run<S>(self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        self.start().await?;

        let mut import_tick = time::interval(self.config.import_interval.unsigned_abs());
        import_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll_tick = time::interval(self.config.poll_interval.unsigned_abs());
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Scheduler started (import every {:#}, poll every {:#})",
            self.config.import_interval, self.config.poll_interval
        );

        tokio::pin!(signal);
        loop {
            // Both timers fire at once on startup; importing first lets the
            // first poll see the fresh plans
            tokio::select! {
                biased;
                _ = &mut signal => break,
                _ = import_tick.tick() => {
                    if let Err(e) = self.importer.import_plans().await {
                        error!("Import failed: {e}");
                    }
                }
                _ = poll_tick.tick() => {
                    if let Err(e) = self.monitor.process_plans().await {
                        error!("Due-job poll failed: {e}");
                    }
                }
            }
        }

        self.stop().await
    }

    async fn start(&self) -> Result<()> {
        self.provisioner.connect().await?;

        let inbox = self.inbox.clone();
        task::spawn_blocking(move || inbox.ensure_layout())
            .await
            .map_err(|e| LeaseError::join(&e))??;

        let reset = self.store.reset_interrupted_jobs().await?;
        if reset > 0 {
            info!("Reset {reset} jobs interrupted by a previous run");
        }
        Ok(())
    }

    async fn stop(self) -> Result<()> {
        info!("Shutting down");
        self.shutdown.trigger();

        let grace = self.config.shutdown_grace.unsigned_abs();
        if time::timeout(grace, self.registry.wait_idle()).await.is_err() {
            warn!(
                "Executors for {:?} still running after {:#}",
                self.registry.active_nodes(),
                self.config.shutdown_grace
            );
        }

        if let Err(e) = self.provisioner.disconnect().await {
            warn!("Failed to disconnect provisioner: {e}");
        }

        self.store.close().await?;
        info!("Shutdown complete");
        Ok(())
    }
}
