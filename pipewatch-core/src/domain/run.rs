//! Pipeline run domain types

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Overall status of the most recent run of a pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Success,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The active or most recent run of one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRun {
    pub pipeline_id: String,
    pub overall_status: RunStatus,
    /// Set when a run begins, cleared on completion or reset
    pub started_at: Option<DateTime<Utc>>,
    /// Set when a run succeeds
    pub completed_at: Option<DateTime<Utc>>,
    /// Duration of the most recent successful run
    pub last_duration: Option<TimeDelta>,
    /// Automatic retries consumed in the current failure episode
    pub retry_attempts: u32,
}

impl PipelineRun {
    /// Creates an idle run with no history
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            overall_status: RunStatus::Idle,
            started_at: None,
            completed_at: None,
            last_duration: None,
            retry_attempts: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.overall_status == RunStatus::Running
    }
}
