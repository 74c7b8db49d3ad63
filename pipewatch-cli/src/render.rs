//! Terminal rendering of the run status

use chrono::{DateTime, Local, TimeDelta, Utc};
use colored::*;
use pipewatch_core::PipelineStatusModel;
use pipewatch_core::domain::{RunStatus, StepState};
use serde::Serialize;

/// Machine-readable status, printed by `status --json`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub pipeline_id: String,
    pub status: RunStatus,
    pub retry_attempts: u32,
    pub current_step: Option<String>,
    pub percentage: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<i64>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step_id: String,
    pub display_name: String,
    pub state: StepState,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusReport {
    pub fn new(model: &PipelineStatusModel, next_retry_at: Option<DateTime<Utc>>) -> Self {
        let run = model.run();
        Self {
            pipeline_id: run.pipeline_id.clone(),
            status: run.overall_status,
            retry_attempts: run.retry_attempts,
            current_step: model.current_step().map(str::to_string),
            percentage: model.progress().percentage,
            started_at: run.started_at,
            completed_at: run.completed_at,
            last_duration_ms: run.last_duration.map(|d| d.num_milliseconds()),
            next_retry_at,
            steps: model
                .steps()
                .into_iter()
                .map(|s| StepReport {
                    step_id: s.step_id,
                    display_name: s.display_name,
                    state: s.state,
                    completed_at: s.completed_at,
                })
                .collect(),
        }
    }
}

/// Print the full status of a pipeline
pub fn print_status(
    model: &PipelineStatusModel,
    next_retry_at: Option<DateTime<Utc>>,
    connected: Option<bool>,
) {
    let run = model.run();
    let progress = model.progress();
    let now = Utc::now();

    println!(
        "{} {}  {}",
        "Pipeline".bold(),
        run.pipeline_id.bold(),
        colorize_run_status(run.overall_status)
    );
    println!(
        "  Progress:     {} {}/{} ({}%)",
        progress_bar(progress.percentage, 20),
        progress.complete,
        progress.total,
        progress.percentage
    );

    if let Some(started_at) = run.started_at {
        println!("  Started:      {}", format_time(started_at).dimmed());
    }
    if let Some(remaining) = model.estimated_time_remaining(now) {
        println!("  Remaining:    ~{}", format_duration(remaining));
    }
    if let Some(completed_at) = run.completed_at {
        println!("  Last success: {}", format_time(completed_at).dimmed());
    }
    if let Some(duration) = run.last_duration {
        println!("  Last runtime: {}", format_duration(duration));
    }
    if run.retry_attempts > 0 {
        println!("  Retries used: {}", run.retry_attempts.to_string().yellow());
    }
    if let Some(due) = next_retry_at {
        println!("  Next retry:   {}", format_time(due).yellow());
    }
    if let Some(connected) = connected {
        let label = if connected {
            "connected".green()
        } else {
            "disconnected".red()
        };
        println!("  Realtime:     {}", label);
    }

    println!();
    for step in model.steps() {
        let marker = if model.current_step() == Some(step.step_id.as_str()) {
            "▸".cyan()
        } else {
            " ".normal()
        };
        println!(
            "  {} {:<28} {}",
            marker,
            step.display_name,
            colorize_step_state(step.state)
        );
        if let Some(message) = step.error_message.as_deref().filter(|m| !m.is_empty()) {
            println!("      {}", message.red());
        }
    }
}

/// Colorize a run status for display
pub fn colorize_run_status(status: RunStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        RunStatus::Idle => label.normal(),
        RunStatus::Running => label.yellow(),
        RunStatus::Success => label.green(),
        RunStatus::Failed => label.red(),
    }
}

/// Colorize a step state for display
pub fn colorize_step_state(state: StepState) -> ColoredString {
    let label = state.to_string();
    match state {
        StepState::Pending => label.dimmed(),
        StepState::Running => label.yellow(),
        StepState::Complete => label.green(),
        StepState::Failed => label.red(),
        StepState::Cancelled => label.magenta(),
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Human-readable duration, e.g. `1h 05m` or `42s`
pub fn format_duration(duration: TimeDelta) -> String {
    let secs = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn progress_bar(percentage: u32, width: usize) -> String {
    let filled = (percentage.min(100) as usize * width) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
