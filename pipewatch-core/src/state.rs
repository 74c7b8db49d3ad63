//! Persisted run state
//!
//! The record written to local storage for each pipeline. Writes are partial:
//! only the fields that changed since the previous save are merged into the
//! stored record, so concurrent writers touching different fields do not
//! clobber each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::domain::run::RunStatus;
use crate::domain::step::StepState;

/// Persisted record for one pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedRunState {
    pub status: RunStatus,
    pub retry_attempts: u32,
    pub step_states: BTreeMap<String, StepState>,
    pub step_timestamps: BTreeMap<String, DateTime<Utc>>,
    pub current_run_start: Option<DateTime<Utc>>,
    pub last_successful_run: Option<DateTime<Utc>>,
    /// Milliseconds
    pub last_run_duration: Option<i64>,
}

impl PersistedRunState {
    /// Storage key for a pipeline's record
    pub fn key(pipeline_id: &str) -> String {
        format!("pipeline:{}", pipeline_id)
    }

    /// Decodes a stored record; missing fields take their defaults
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Fields whose serialized value differs from `previous`
    pub fn changed_fields(&self, previous: &Self) -> Result<Map<String, Value>, serde_json::Error> {
        let current = Self::to_object(self)?;
        let previous = Self::to_object(previous)?;

        Ok(current
            .into_iter()
            .filter(|(field, value)| previous.get(field) != Some(value))
            .collect())
    }

    /// All fields, for the first write of a record
    pub fn all_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        Self::to_object(self)
    }

    fn to_object(state: &Self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(state)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}
