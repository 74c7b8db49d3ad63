//! One-shot pipeline commands
//!
//! Each invocation loads the persisted state, performs one command through
//! the controller and prints the resulting status.

use anyhow::{Context, Result};
use pipewatch_monitor::UserCommand;

use super::Session;
use crate::config::Config;
use crate::render::{StatusReport, print_status};

/// Print the pipeline status
pub async fn show_status(config: &Config, offline: bool, json: bool) -> Result<()> {
    let mut session = Session::open(config)?;

    if !offline {
        // Reconciliation failures are logged and leave the local view intact
        session
            .controller
            .dispatch(UserCommand::Reconcile)
            .await
            .context("Failed to reconcile with the backend")?;
    }

    let model = session.controller.model();
    if json {
        let report = StatusReport::new(model, session.controller.next_retry_at());
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_status(model, session.controller.next_retry_at(), None);
    }

    Ok(())
}

/// Execute a single operator command
pub async fn run_command(config: &Config, command: UserCommand) -> Result<()> {
    let mut session = Session::open(config)?;

    session
        .controller
        .dispatch(command)
        .await
        .with_context(|| format!("Failed to {} pipeline '{}'", command, config.pipeline_id))?;

    println!();
    print_status(session.controller.model(), None, None);
    Ok(())
}
