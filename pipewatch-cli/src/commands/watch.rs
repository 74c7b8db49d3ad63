//! Interactive watch mode
//!
//! Runs the controller loop with a live realtime channel. Commands are read
//! from stdin one per line; every state change prints a one-line summary.

use anyhow::{Context, Result};
use colored::*;
use pipewatch_monitor::{
    ControllerEvent, RealtimeStatusChannel, ReconnectPolicy, StatusView, UserCommand,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::Session;
use crate::config::Config;
use crate::render::{colorize_run_status, print_status};

const HELP: &str = "Commands: run, cancel, restart, reset, reconcile, status, help, quit";

/// A line typed by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Command(UserCommand),
    Status,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let input = match line.trim().to_ascii_lowercase().as_str() {
        "run" | "start" => Input::Command(UserCommand::Run),
        "cancel" | "stop" => Input::Command(UserCommand::Cancel),
        "restart" => Input::Command(UserCommand::Restart),
        "reset" => Input::Command(UserCommand::Reset),
        "reconcile" | "sync" => Input::Command(UserCommand::Reconcile),
        "status" | "s" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

/// Follow the pipeline until the operator quits
pub async fn watch(config: &Config) -> Result<()> {
    let Session {
        client,
        catalog,
        controller,
        events,
    } = Session::open(config)?;

    let sender = controller.sender();
    let mut view = controller.subscribe();

    let channel =
        RealtimeStatusChannel::new(client, catalog, ReconnectPolicy::default(), sender.clone())
            .spawn();
    let mut task = tokio::spawn(controller.run(events, Some(channel)));

    println!(
        "{} {}",
        "Watching pipeline".bold(),
        config.pipeline_id.bold()
    );
    println!("{}", HELP.dimmed());
    print_status(&view.borrow_and_update().model, None, Some(false));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_summary = String::new();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match parse_input(&line) {
                    Some(Input::Command(command)) => {
                        if sender.send(ControllerEvent::Command(command)).await.is_err() {
                            break;
                        }
                    }
                    Some(Input::Status) => {
                        let current = view.borrow().clone();
                        print_status(&current.model, current.next_retry_at, Some(current.connected));
                    }
                    Some(Input::Help) => println!("{}", HELP),
                    Some(Input::Quit) => break,
                    None => println!("{} '{}'. {}", "Unknown command".yellow(), line.trim(), HELP),
                }
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = summarize(&view.borrow_and_update());
                if summary != last_summary {
                    println!("{}", summary);
                    last_summary = summary;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
            _ = &mut task => {
                debug!("Controller loop ended");
                return Ok(());
            }
        }
    }

    let _ = sender.send(ControllerEvent::Shutdown).await;
    task.await.context("Controller task failed")?;
    Ok(())
}

/// One-line summary of a status view
fn summarize(view: &StatusView) -> String {
    let model = &view.model;
    let progress = model.progress();

    let mut summary = format!(
        "{} {}/{} ({}%)",
        colorize_run_status(model.status()),
        progress.complete,
        progress.total,
        progress.percentage
    );

    if let Some(step) = model
        .current_step()
        .and_then(|id| model.catalog().get(id))
    {
        summary.push_str(&format!(" {} {}", "▸".cyan(), step.display_name));
    }
    if let Some(due) = view.next_retry_at {
        summary.push_str(&format!(
            " {}",
            format!("retry at {}", due.with_timezone(&chrono::Local).format("%H:%M")).yellow()
        ));
    }
    if !view.connected {
        summary.push_str(&format!(" {}", "(offline)".dimmed()));
    }

    summary
}
