//! Error types for the run-status model

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the run-status model and the step catalog
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Event or command references a step outside the catalog
    #[error("unknown step '{step_id}' for pipeline '{pipeline_id}'")]
    UnknownStep {
        pipeline_id: String,
        step_id: String,
    },

    /// A run was requested while one is already in progress
    #[error("pipeline '{pipeline_id}' is already running")]
    RunInProgress {
        pipeline_id: String,
        started_at: Option<DateTime<Utc>>,
    },

    /// Catalog failed validation
    #[error("invalid step catalog: {0}")]
    InvalidCatalog(String),
}
