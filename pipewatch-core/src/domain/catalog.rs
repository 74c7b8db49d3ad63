//! Static step catalog
//!
//! Every pipeline declares an ordered list of steps up front. Events that
//! reference a step outside this list are rejected rather than stored, so
//! progress counters only ever count declared steps.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ModelError;

/// One declared step of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    #[serde(rename = "stepId")]
    pub id: String,
    pub display_name: String,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Ordered catalog of the steps of one pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCatalog {
    pub pipeline_id: String,
    steps: Vec<StepDefinition>,
}

impl StepCatalog {
    /// Identifier of the built-in data refresh pipeline
    pub const DATA_REFRESH: &'static str = "data-refresh";

    /// Creates a catalog, rejecting empty or duplicate step ids
    pub fn new(
        pipeline_id: impl Into<String>,
        steps: Vec<StepDefinition>,
    ) -> Result<Self, ModelError> {
        let catalog = Self {
            pipeline_id: pipeline_id.into(),
            steps,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses a catalog from its JSON form
    ///
    /// ```json
    /// { "pipelineId": "nightly", "steps": [{ "stepId": "a", "displayName": "A" }] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let catalog: Self = serde_json::from_str(json)
            .map_err(|e| ModelError::InvalidCatalog(format!("malformed catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Returns the built-in catalog for a known pipeline
    pub fn builtin(pipeline_id: &str) -> Option<Self> {
        match pipeline_id {
            Self::DATA_REFRESH => Some(Self::data_refresh()),
            _ => None,
        }
    }

    /// The nightly data refresh pipeline, including the pricing rule pass
    pub fn data_refresh() -> Self {
        Self {
            pipeline_id: Self::DATA_REFRESH.to_string(),
            steps: vec![
                StepDefinition::new("extract", "Extract Source Data"),
                StepDefinition::new("validate", "Validate Records"),
                StepDefinition::new("transform", "Transform Dataset"),
                StepDefinition::new("apply-pricing", "Apply Pricing Rules"),
                StepDefinition::new("load", "Load Warehouse"),
                StepDefinition::new("publish", "Publish Reports"),
            ],
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.pipeline_id.trim().is_empty() {
            return Err(ModelError::InvalidCatalog(
                "pipeline id cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(ModelError::InvalidCatalog(
                    "step id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(ModelError::InvalidCatalog(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
        }

        Ok(())
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.get(step_id).is_some()
    }

    pub fn get(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Attributes a backend-reported failure to a declared step
    ///
    /// The backend reports either the step id or its display name. Exact id
    /// matches win, then case-insensitive display name matches. With
    /// `legacy_matching` the old loose rule (id contains the report, or the
    /// report contains the display name) is tried last, and only attributes
    /// the failure when exactly one step matches.
    pub fn resolve_failed_step(
        &self,
        reported: &str,
        legacy_matching: bool,
    ) -> Option<&StepDefinition> {
        let reported = reported.trim();
        if reported.is_empty() {
            return None;
        }

        if let Some(step) = self.get(reported) {
            return Some(step);
        }

        if let Some(step) = self
            .steps
            .iter()
            .find(|s| s.display_name.eq_ignore_ascii_case(reported))
        {
            return Some(step);
        }

        if !legacy_matching {
            return None;
        }

        let mut candidates = self
            .steps
            .iter()
            .filter(|s| s.id.contains(reported) || reported.contains(s.display_name.as_str()));
        match (candidates.next(), candidates.next()) {
            (Some(step), None) => Some(step),
            _ => None,
        }
    }
}
