//! Monitor error taxonomy
//!
//! None of these errors are fatal to the monitor. Callers convert them into
//! notifications or log lines at the point where they occur.

use chrono::{DateTime, Utc};
use pipewatch_client::ClientError;
use pipewatch_core::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Model rejected an event or command (unknown step, run conflict)
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Network failure on a backend call
    #[error("backend request failed: {0}")]
    Transport(#[from] ClientError),

    /// Backend answered a command with `success: false`
    #[error("backend rejected {action}: {message}")]
    Rejected {
        action: &'static str,
        message: String,
    },

    /// Local run had been `running` for longer than the staleness threshold
    #[error("run of '{pipeline_id}' was still marked running after the staleness threshold and has been reset")]
    StaleRunDetected {
        pipeline_id: String,
        started_at: Option<DateTime<Utc>>,
    },

    /// Snapshot could not be fetched or decoded
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),

    /// Automatic retries are used up
    #[error("pipeline '{pipeline_id}' failed {attempts} times in a row; automatic retries are exhausted, reset or restart it manually")]
    RetryBudgetExhausted { pipeline_id: String, attempts: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),
}
