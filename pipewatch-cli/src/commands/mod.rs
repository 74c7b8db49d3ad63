//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod catalog;
mod pipeline;
mod watch;

use anyhow::{Context, Result};
use clap::Subcommand;
use pipewatch_client::PipelineClient;
use pipewatch_core::domain::StepCatalog;
use pipewatch_monitor::{ControllerEvent, PipelineController, UserCommand};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::notify::ConsoleNotifier;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show the local run status, reconciled against the backend
    Status {
        /// Skip reconciliation and show local state only
        #[arg(long)]
        offline: bool,

        /// Print JSON instead of the formatted view
        #[arg(long)]
        json: bool,
    },
    /// Start a pipeline run
    Start,
    /// Cancel the active run
    Cancel,
    /// Cancel the active run if any and start a fresh one
    Restart,
    /// Reset every step to pending
    Reset,
    /// Correct local state from the backend snapshot
    Reconcile,
    /// Follow the pipeline live and accept commands on stdin
    ///
    /// Automatic retries only fire while a watch session is running.
    Watch,
    /// Show the step catalog of the pipeline
    Catalog {
        /// Print JSON instead of the formatted view
        #[arg(long)]
        json: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Status { offline, json } => pipeline::show_status(config, offline, json).await,
        Commands::Start => pipeline::run_command(config, UserCommand::Run).await,
        Commands::Cancel => pipeline::run_command(config, UserCommand::Cancel).await,
        Commands::Restart => pipeline::run_command(config, UserCommand::Restart).await,
        Commands::Reset => pipeline::run_command(config, UserCommand::Reset).await,
        Commands::Reconcile => pipeline::run_command(config, UserCommand::Reconcile).await,
        Commands::Watch => watch::watch(config).await,
        Commands::Catalog { json } => catalog::show_catalog(config, json),
    }
}

/// Everything a command needs to talk to one pipeline
struct Session {
    client: Arc<PipelineClient>,
    catalog: Arc<StepCatalog>,
    controller: PipelineController,
    events: mpsc::Receiver<ControllerEvent>,
}

impl Session {
    fn open(config: &Config) -> Result<Self> {
        let catalog = Arc::new(config.catalog()?);
        let client = Arc::new(PipelineClient::new(&config.backend_url));

        let (controller, events) = PipelineController::new(
            config.monitor_config()?,
            catalog.clone(),
            config.store(),
            client.clone(),
            Arc::new(ConsoleNotifier),
        )
        .context("Failed to initialize the pipeline monitor")?;

        Ok(Self {
            client,
            catalog,
            controller,
            events,
        })
    }
}
