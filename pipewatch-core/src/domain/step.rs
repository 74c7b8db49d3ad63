//! Step domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a single pipeline step
///
/// Deserialization accepts the spellings the backend uses interchangeably
/// (`completed`/`success`, `error`, `canceled`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    #[default]
    Pending,
    Running,
    #[serde(alias = "completed", alias = "success")]
    Complete,
    #[serde(alias = "error")]
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl StepState {
    /// Whether the step has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepState::Complete | StepState::Failed | StepState::Cancelled
        )
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepState::Pending => write!(f, "pending"),
            StepState::Running => write!(f, "running"),
            StepState::Complete => write!(f, "complete"),
            StepState::Failed => write!(f, "failed"),
            StepState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Read-only view of one step of the current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub step_id: String,
    pub display_name: String,
    pub state: StepState,
    /// Set when the state becomes complete
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}
