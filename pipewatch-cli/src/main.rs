//! Pipewatch CLI
//!
//! Command-line interface for observing and driving a pipeline run.

mod commands;
mod config;
mod notify;
mod render;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{Config, PolicyArgs};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pipewatch")]
#[command(about = "Pipeline run monitor", long_about = None)]
struct Cli {
    /// Backend URL
    #[arg(
        long,
        env = "PIPEWATCH_BACKEND_URL",
        default_value = "http://localhost:8080"
    )]
    backend_url: String,

    /// Pipeline to observe
    #[arg(
        short,
        long,
        env = "PIPEWATCH_PIPELINE",
        default_value = "data-refresh"
    )]
    pipeline: String,

    /// Local state file (defaults to ~/.pipewatch/state.json)
    #[arg(long, env = "PIPEWATCH_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// JSON step catalog, required for pipelines without a built-in catalog
    #[arg(long, env = "PIPEWATCH_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(flatten)]
    policy: PolicyArgs,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with rendered output
    let default_filter = if cli.verbose {
        "pipewatch=debug"
    } else {
        "pipewatch=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config {
        backend_url: cli.backend_url,
        pipeline_id: cli.pipeline,
        state_file: cli.state_file.unwrap_or_else(config::default_state_file),
        catalog_file: cli.catalog,
        policy: cli.policy,
    };

    handle_command(cli.command, &config).await
}
