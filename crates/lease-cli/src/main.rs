//! Lease CLI Application
//!
//! Command-line interface for the lease scheduler: runs the import and
//! due-job loops, and inspects the plans they produce.

mod args;
mod cli;
mod renderer;

use anyhow::{Context, Result};
use args::{Args, Commands, ListPlansArgs};
use clap::Parser;
use cli::Cli;
use lease_core::{Config, StoreBuilder};
use log::info;
use renderer::TerminalRenderer;
use Commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Args {
        config,
        database_file,
        inbox_dir,
        no_color,
        command,
    } = Args::parse();

    let mut config = Config::load(config.as_deref()).context("Failed to load configuration")?;
    if database_file.is_some() {
        config.database_path = database_file;
    }
    if inbox_dir.is_some() {
        config.inbox_dir = inbox_dir;
    }

    config.validate()?;

    let renderer = TerminalRenderer::new(!no_color);

    let command = match command {
        Some(ShowConfig) => return cli::show_config(&config),
        other => other,
    };

    let store = StoreBuilder::new()
        .with_database_path(Some(config.database_path()?))
        .build()
        .await
        .context("Failed to initialize database")?;

    let cli = Cli::new(config, store, renderer);

    match command {
        Some(Run) => {
            info!("Lease started");
            cli.run(shutdown_signal()).await
        }
        Some(Poll) => cli.poll(shutdown_signal()).await,
        Some(Import) => {
            cli.import().await?;
            cli.close().await
        }
        Some(Due(args)) => {
            cli.due(args).await?;
            cli.close().await
        }
        Some(Plans { command }) => {
            cli.handle_plans_command(command).await?;
            cli.close().await
        }
        Some(ShowConfig) => Ok(()),
        None => {
            cli.list_plans(ListPlansArgs { status: None }).await?;
            cli.close().await
        }
    }
}

/// Resolves on Ctrl-C, or on SIGTERM where there is one.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
