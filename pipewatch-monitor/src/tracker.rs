//! Run tracker
//!
//! The effect layer around [`PipelineStatusModel`]. Every accepted
//! transition is persisted before `apply` returns, so a mutation and its
//! write can never interleave with another mutation. Only the fields that
//! changed since the last successful write are sent to the store.

use chrono::{DateTime, Utc};
use pipewatch_core::domain::StepCatalog;
use pipewatch_core::model::{ModelEvent, PipelineStatusModel, Transition};
use pipewatch_core::state::PersistedRunState;
use pipewatch_core::store::StateStore;
use pipewatch_core::{ModelError, RecoveryPolicy};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::MonitorError;

/// Owns the model of one pipeline and keeps the store in step with it
pub struct RunTracker {
    model: PipelineStatusModel,
    store: Arc<dyn StateStore>,
    key: String,
    /// Last record known to be in the store
    saved: Option<PersistedRunState>,
}

impl RunTracker {
    /// Loads the pipeline's record from the store
    ///
    /// A missing or unreadable record yields an idle model. Read failures are
    /// logged; the in-memory model stays authoritative for the session.
    pub fn load(
        catalog: Arc<StepCatalog>,
        policy: &RecoveryPolicy,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let key = PersistedRunState::key(&catalog.pipeline_id);

        let saved = match store.read(&key) {
            Ok(Some(value)) => match PersistedRunState::from_value(value) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!("Ignoring unreadable persisted state under '{}': {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read persisted state under '{}': {}", key, e);
                None
            }
        };

        let model = match &saved {
            Some(state) => {
                debug!("Restored state for '{}': {:?}", key, state.status);
                PipelineStatusModel::from_persisted(
                    catalog,
                    policy.legacy_step_matching,
                    state.clone(),
                )
            }
            None => PipelineStatusModel::new(catalog, policy.legacy_step_matching),
        };

        Self {
            model,
            store,
            key,
            saved,
        }
    }

    pub fn model(&self) -> &PipelineStatusModel {
        &self.model
    }

    /// Applies an event and persists the result
    ///
    /// Rejected events are logged and leave both model and store untouched.
    pub fn apply(&mut self, event: ModelEvent) -> Result<Transition, ModelError> {
        let transition = match self.model.apply(event) {
            Ok(transition) => transition,
            Err(e) => {
                warn!("Rejected event for '{}': {}", self.key, e);
                return Err(e);
            }
        };

        if transition.is_change() {
            self.persist();
        } else {
            debug!("Event for '{}' ignored: {:?}", self.key, transition);
        }

        Ok(transition)
    }

    /// Resets a run that has been `running` for longer than the threshold
    ///
    /// The backend's real state is unknown in this situation, so local state
    /// is cleared rather than guessed.
    pub fn recover_stale(
        &mut self,
        now: DateTime<Utc>,
        policy: &RecoveryPolicy,
    ) -> Option<MonitorError> {
        if !self.model.is_stale(now, policy.stale_after_delta()) {
            return None;
        }

        let started_at = self.model.run().started_at;
        info!(
            "Run of '{}' started at {:?} is stale, resetting",
            self.model.pipeline_id(),
            started_at
        );

        self.model.reset_all();
        self.persist();

        Some(MonitorError::StaleRunDetected {
            pipeline_id: self.model.pipeline_id().to_string(),
            started_at,
        })
    }

    fn persist(&mut self) {
        let current = self.model.to_persisted();
        let fields = match &self.saved {
            Some(previous) => current.changed_fields(previous),
            None => current.all_fields(),
        };

        let fields = match fields {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Failed to serialize state for '{}': {}", self.key, e);
                return;
            }
        };

        if fields.is_empty() {
            return;
        }

        match self.store.merge(&self.key, fields) {
            Ok(()) => self.saved = Some(current),
            Err(e) => warn!("Failed to persist state for '{}': {}", self.key, e),
        }
    }
}
