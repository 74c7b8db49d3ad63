//! Configuration module
//!
//! Handles CLI configuration: backend URL, observed pipeline, local state
//! location and the recovery policy knobs.

use anyhow::{Context, Result, bail};
use clap::Args;
use pipewatch_core::RecoveryPolicy;
use pipewatch_core::domain::StepCatalog;
use pipewatch_core::store::JsonFileStore;
use pipewatch_monitor::MonitorConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Recovery policy flags shared by every command
#[derive(Debug, Clone, Args)]
pub struct PolicyArgs {
    /// Automatic retries allowed before manual intervention is required
    #[arg(long, env = "PIPEWATCH_MAX_RETRIES", default_value = "5")]
    pub max_retries: u32,

    /// Minutes between a failure and its automatic retry
    #[arg(long, env = "PIPEWATCH_RETRY_INTERVAL_MINUTES", default_value = "30")]
    pub retry_interval_minutes: u64,

    /// Hours after which a run still marked running is reset
    #[arg(long, env = "PIPEWATCH_STALE_AFTER_HOURS", default_value = "6")]
    pub stale_after_hours: u64,

    /// Seconds between reconciliations in watch mode
    #[arg(long, env = "PIPEWATCH_RECONCILE_INTERVAL", default_value = "60")]
    pub reconcile_interval_secs: u64,

    /// Attribute failures by loose substring match on step names
    #[arg(long, env = "PIPEWATCH_LEGACY_STEP_MATCHING")]
    pub legacy_step_matching: bool,
}

impl Default for PolicyArgs {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_interval_minutes: 30,
            stale_after_hours: 6,
            reconcile_interval_secs: 60,
            legacy_step_matching: false,
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the pipeline backend
    pub backend_url: String,

    /// Pipeline being observed
    pub pipeline_id: String,

    /// JSON document holding persisted run state
    pub state_file: PathBuf,

    /// Optional catalog override
    pub catalog_file: Option<PathBuf>,

    pub policy: PolicyArgs,
}

/// `~/.pipewatch/state.json`, or `./.pipewatch/state.json` without a home
pub fn default_state_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pipewatch")
        .join("state.json")
}

impl Config {
    /// Loads the step catalog for the observed pipeline
    ///
    /// A catalog file wins over the built-in catalog.
    pub fn catalog(&self) -> Result<StepCatalog> {
        let catalog = match &self.catalog_file {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
                StepCatalog::from_json(&json)
                    .with_context(|| format!("Invalid catalog file: {}", path.display()))?
            }
            None => match StepCatalog::builtin(&self.pipeline_id) {
                Some(catalog) => catalog,
                None => bail!(
                    "No built-in catalog for pipeline '{}'; pass --catalog <file>",
                    self.pipeline_id
                ),
            },
        };

        if catalog.pipeline_id != self.pipeline_id {
            bail!(
                "Catalog describes pipeline '{}' but '{}' was requested",
                catalog.pipeline_id,
                self.pipeline_id
            );
        }

        Ok(catalog)
    }

    pub fn store(&self) -> Arc<JsonFileStore> {
        Arc::new(JsonFileStore::new(self.state_file.clone()))
    }

    pub fn recovery_policy(&self) -> RecoveryPolicy {
        RecoveryPolicy {
            max_retry_attempts: self.policy.max_retries,
            retry_interval: Duration::from_secs(
                self.policy.retry_interval_minutes.saturating_mul(60),
            ),
            stale_after: Duration::from_secs(self.policy.stale_after_hours.saturating_mul(60 * 60)),
            legacy_step_matching: self.policy.legacy_step_matching,
        }
    }

    /// Monitor configuration, validated
    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        let mut config = MonitorConfig::new(self.pipeline_id.clone());
        config.recovery = self.recovery_policy();
        config.reconcile_interval = Duration::from_secs(self.policy.reconcile_interval_secs);
        config.validate().context("Invalid monitor configuration")?;
        Ok(config)
    }
}
