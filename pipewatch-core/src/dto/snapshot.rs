//! Status snapshot DTOs
//!
//! The snapshot is the backend's authoritative view of every pipeline and is
//! used to correct local drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::catalog::StepCatalog;
use crate::domain::step::StepState;

/// Authoritative step statuses for one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub pipeline_id: String,
    #[serde(default)]
    pub step_statuses: HashMap<String, SnapshotStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStep {
    pub status: StepState,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl PipelineSnapshot {
    /// Whether every declared step reports completion
    ///
    /// An empty catalog never counts as complete.
    pub fn all_complete(&self, catalog: &StepCatalog) -> bool {
        !catalog.is_empty()
            && catalog.steps().iter().all(|step| {
                self.step_statuses
                    .get(&step.id)
                    .is_some_and(|s| s.status == StepState::Complete)
            })
    }

    /// Earliest and latest timestamps reported for declared steps
    pub fn time_window(&self, catalog: &StepCatalog) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let timestamps = catalog
            .steps()
            .iter()
            .filter_map(|step| self.step_statuses.get(&step.id))
            .filter_map(|s| s.timestamp);

        timestamps.fold(None, |window, ts| match window {
            None => Some((ts, ts)),
            Some((min, max)) => Some((min.min(ts), max.max(ts))),
        })
    }
}
