//! Run-status model
//!
//! `PipelineStatusModel` holds the current run of one pipeline and the state
//! of each declared step. It performs no I/O: every mutation goes through
//! [`PipelineStatusModel::apply`], which returns a [`Transition`] describing
//! what changed so the caller can persist and notify.
//!
//! Event application rules:
//! - Step ids outside the catalog are rejected with [`ModelError::UnknownStep`]
//!   and leave the model untouched.
//! - An event older than the last applied event for the same step is ignored.
//! - While the run is not `running`, non-terminal events are ignored and
//!   terminal events only update the step's bookkeeping. This keeps late
//!   events from resurrecting a run that was cancelled locally.
//! - A single failed step fails the whole run. All steps complete means
//!   success.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::catalog::StepCatalog;
use crate::domain::run::{PipelineRun, RunStatus};
use crate::domain::step::{StepState, StepStatus};
use crate::error::ModelError;
use crate::state::PersistedRunState;

/// Input to the run-status transition function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// Begin a fresh run
    StartRun { at: DateTime<Utc> },

    /// A step changed state
    StepUpdate {
        step_id: String,
        state: StepState,
        timestamp: DateTime<Utc>,
        error_message: Option<String>,
    },

    /// Mark the run successful. `started_at` overrides the local start time
    /// when computing the duration.
    CompleteRun {
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    },

    /// Fail the run, optionally attributing the failure to a step
    FailRun { step: Option<String> },

    /// The backend accepted a cancel request
    CancelRun,

    /// Clear the run back to idle
    ResetAll,

    /// Forget consumed retries after exhaustion has been reported
    ClearRetryBudget,
}

/// Why an event was accepted without changing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No run is active, or the event would undo a successful run
    RunNotActive,
    /// Event is older than the last one applied to the step
    OutOfOrder,
    /// The requested state is already in place
    AlreadyApplied,
}

/// Outcome of applying a [`ModelEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Ignored(IgnoreReason),
    StepUpdated {
        step_id: String,
        state: StepState,
    },
    RunStarted,
    RunSucceeded {
        duration: Option<TimeDelta>,
    },
    RunFailed {
        step_id: Option<String>,
        retry_attempts: u32,
    },
    RunCancelled {
        cancelled_steps: Vec<String>,
    },
    RunReset,
    RetryBudgetCleared,
}

impl Transition {
    /// Whether the transition changed model state
    pub fn is_change(&self) -> bool {
        !matches!(self, Transition::Ignored(_))
    }
}

/// Step counts for the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: usize,
    pub complete: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub running: usize,
    pub pending: usize,
    /// `round(100 * complete / total)`, 0 for an empty catalog
    pub percentage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StepRecord {
    state: StepState,
    timestamp: Option<DateTime<Utc>>,
    error_message: Option<String>,
}

/// In-memory state of one pipeline's current run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatusModel {
    catalog: Arc<StepCatalog>,
    legacy_step_matching: bool,
    run: PipelineRun,
    steps: BTreeMap<String, StepRecord>,
    current_step: Option<String>,
}

impl PipelineStatusModel {
    /// Creates an idle model for the catalog's pipeline
    pub fn new(catalog: Arc<StepCatalog>, legacy_step_matching: bool) -> Self {
        let run = PipelineRun::new(catalog.pipeline_id.clone());
        Self {
            catalog,
            legacy_step_matching,
            run,
            steps: BTreeMap::new(),
            current_step: None,
        }
    }

    /// Rebuilds a model from its persisted record
    ///
    /// Step entries that are not in the catalog are dropped with a warning.
    pub fn from_persisted(
        catalog: Arc<StepCatalog>,
        legacy_step_matching: bool,
        state: PersistedRunState,
    ) -> Self {
        let mut model = Self::new(catalog, legacy_step_matching);
        let PersistedRunState {
            status,
            retry_attempts,
            step_states,
            mut step_timestamps,
            current_run_start,
            last_successful_run,
            last_run_duration,
        } = state;

        for (step_id, step_state) in step_states {
            if !model.catalog.contains(&step_id) {
                warn!(
                    "Dropping persisted state for unknown step '{}' of pipeline '{}'",
                    step_id, model.catalog.pipeline_id
                );
                continue;
            }
            let timestamp = step_timestamps.remove(&step_id);
            model.steps.insert(
                step_id,
                StepRecord {
                    state: step_state,
                    timestamp,
                    error_message: None,
                },
            );
        }

        model.run.overall_status = status;
        model.run.retry_attempts = retry_attempts;
        model.run.started_at = current_run_start;
        model.run.completed_at = last_successful_run;
        model.run.last_duration = last_run_duration.and_then(TimeDelta::try_milliseconds);
        model.current_step = model
            .catalog
            .steps()
            .iter()
            .find(|s| model.state_of(&s.id) == StepState::Running)
            .map(|s| s.id.clone());
        model
    }

    /// Serializable form of the model
    pub fn to_persisted(&self) -> PersistedRunState {
        PersistedRunState {
            status: self.run.overall_status,
            retry_attempts: self.run.retry_attempts,
            step_states: self
                .steps
                .iter()
                .map(|(id, record)| (id.clone(), record.state))
                .collect(),
            step_timestamps: self
                .steps
                .iter()
                .filter_map(|(id, record)| record.timestamp.map(|ts| (id.clone(), ts)))
                .collect(),
            current_run_start: self.run.started_at,
            last_successful_run: self.run.completed_at,
            last_run_duration: self.run.last_duration.map(|d| d.num_milliseconds()),
        }
    }

    pub fn catalog(&self) -> &Arc<StepCatalog> {
        &self.catalog
    }

    pub fn pipeline_id(&self) -> &str {
        &self.run.pipeline_id
    }

    pub fn run(&self) -> &PipelineRun {
        &self.run
    }

    pub fn status(&self) -> RunStatus {
        self.run.overall_status
    }

    pub fn retry_attempts(&self) -> u32 {
        self.run.retry_attempts
    }

    /// Step currently executing, if any
    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    /// State of a step; steps with no recorded state are pending
    pub fn state_of(&self, step_id: &str) -> StepState {
        self.steps
            .get(step_id)
            .map(|record| record.state)
            .unwrap_or_default()
    }

    /// Status of every declared step, in catalog order
    pub fn steps(&self) -> Vec<StepStatus> {
        self.catalog
            .steps()
            .iter()
            .map(|def| {
                let record = self.steps.get(&def.id).cloned().unwrap_or_default();
                StepStatus {
                    step_id: def.id.clone(),
                    display_name: def.display_name.clone(),
                    state: record.state,
                    completed_at: record
                        .timestamp
                        .filter(|_| record.state == StepState::Complete),
                    error_message: record.error_message,
                }
            })
            .collect()
    }

    /// Applies one event and reports what changed
    pub fn apply(&mut self, event: ModelEvent) -> Result<Transition, ModelError> {
        match event {
            ModelEvent::StartRun { at } => self.start_run(at),
            ModelEvent::StepUpdate {
                step_id,
                state,
                timestamp,
                error_message,
            } => self.apply_step_event(&step_id, state, timestamp, error_message),
            ModelEvent::CompleteRun {
                started_at,
                completed_at,
            } => Ok(self.complete_run(started_at, completed_at)),
            ModelEvent::FailRun { step } => Ok(self.fail_run(step.as_deref())),
            ModelEvent::CancelRun => Ok(self.cancel_run()),
            ModelEvent::ResetAll => Ok(self.reset_all()),
            ModelEvent::ClearRetryBudget => Ok(self.clear_retry_budget()),
        }
    }

    /// Begins a fresh run; every step goes back to pending
    pub fn start_run(&mut self, at: DateTime<Utc>) -> Result<Transition, ModelError> {
        if self.run.is_running() {
            return Err(ModelError::RunInProgress {
                pipeline_id: self.run.pipeline_id.clone(),
                started_at: self.run.started_at,
            });
        }

        self.run.overall_status = RunStatus::Running;
        self.run.started_at = Some(at);
        self.run.completed_at = None;
        self.steps.clear();
        self.current_step = None;
        Ok(Transition::RunStarted)
    }

    /// Applies a realtime step event
    pub fn apply_step_event(
        &mut self,
        step_id: &str,
        state: StepState,
        timestamp: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Result<Transition, ModelError> {
        if !self.catalog.contains(step_id) {
            return Err(ModelError::UnknownStep {
                pipeline_id: self.run.pipeline_id.clone(),
                step_id: step_id.to_string(),
            });
        }

        let active = self.run.is_running();
        if !active && !state.is_terminal() {
            return Ok(Transition::Ignored(IgnoreReason::RunNotActive));
        }
        if self.run.overall_status == RunStatus::Success && state != StepState::Complete {
            return Ok(Transition::Ignored(IgnoreReason::RunNotActive));
        }

        if let Some(last) = self.steps.get(step_id).and_then(|r| r.timestamp) {
            if timestamp < last {
                return Ok(Transition::Ignored(IgnoreReason::OutOfOrder));
            }
        }

        if state == StepState::Running {
            // Steps run one at a time: a new step starting means the previous
            // one finished.
            if let Some(previous) = self.current_step.take() {
                if previous != step_id {
                    if let Some(record) = self.steps.get_mut(&previous) {
                        if record.state == StepState::Running {
                            record.state = StepState::Complete;
                            record.timestamp = Some(timestamp);
                        }
                    }
                }
            }
            self.current_step = Some(step_id.to_string());
        } else if self.current_step.as_deref() == Some(step_id) {
            self.current_step = None;
        }

        self.steps.insert(
            step_id.to_string(),
            StepRecord {
                state,
                timestamp: Some(timestamp),
                error_message,
            },
        );

        if active {
            if state == StepState::Failed {
                return Ok(self.fail_run(Some(step_id)));
            }
            if self.all_steps_complete() {
                return Ok(self.complete_run(None, timestamp));
            }
        }

        Ok(Transition::StepUpdated {
            step_id: step_id.to_string(),
            state,
        })
    }

    /// Marks the run successful and every step complete
    ///
    /// The duration is measured from `started_at`, falling back to the local
    /// start time.
    pub fn complete_run(
        &mut self,
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    ) -> Transition {
        let duration = started_at
            .or(self.run.started_at)
            .map(|start| (completed_at - start).max(TimeDelta::zero()));

        self.run.overall_status = RunStatus::Success;
        self.run.completed_at = Some(completed_at);
        self.run.started_at = None;
        self.run.retry_attempts = 0;
        if duration.is_some() {
            self.run.last_duration = duration;
        }

        for def in self.catalog.steps() {
            let record = self.steps.entry(def.id.clone()).or_default();
            if record.state != StepState::Complete || record.timestamp.is_none() {
                record.state = StepState::Complete;
                record.timestamp = Some(completed_at);
            }
            record.error_message = None;
        }
        self.current_step = None;

        Transition::RunSucceeded { duration }
    }

    /// Fails the run and consumes one retry attempt
    pub fn fail_run(&mut self, failed_step: Option<&str>) -> Transition {
        self.run.retry_attempts = self.run.retry_attempts.saturating_add(1);
        self.run.overall_status = RunStatus::Failed;

        let step_id = failed_step
            .and_then(|reported| {
                self.catalog
                    .resolve_failed_step(reported, self.legacy_step_matching)
            })
            .map(|def| def.id.clone());

        if let Some(id) = &step_id {
            let record = self.steps.entry(id.clone()).or_default();
            record.state = StepState::Failed;
            if self.current_step.as_deref() == Some(id.as_str()) {
                self.current_step = None;
            }
        } else if let Some(reported) = failed_step {
            warn!(
                "Could not attribute failure '{}' to a step of pipeline '{}'",
                reported, self.run.pipeline_id
            );
        }

        Transition::RunFailed {
            step_id,
            retry_attempts: self.run.retry_attempts,
        }
    }

    /// Optimistically cancels the active run
    pub fn cancel_run(&mut self) -> Transition {
        if !self.run.is_running() {
            return Transition::Ignored(IgnoreReason::RunNotActive);
        }

        let mut cancelled_steps = Vec::new();
        for (id, record) in self.steps.iter_mut() {
            if record.state == StepState::Running {
                record.state = StepState::Cancelled;
                cancelled_steps.push(id.clone());
            }
        }

        self.run.overall_status = RunStatus::Idle;
        self.run.started_at = None;
        self.current_step = None;

        Transition::RunCancelled { cancelled_steps }
    }

    /// Clears the run to idle with no step state and a fresh retry budget
    pub fn reset_all(&mut self) -> Transition {
        self.run.overall_status = RunStatus::Idle;
        self.run.started_at = None;
        self.run.retry_attempts = 0;
        self.steps.clear();
        self.current_step = None;
        Transition::RunReset
    }

    pub fn clear_retry_budget(&mut self) -> Transition {
        if self.run.retry_attempts == 0 {
            return Transition::Ignored(IgnoreReason::AlreadyApplied);
        }
        self.run.retry_attempts = 0;
        Transition::RetryBudgetCleared
    }

    /// Whether a `running` run has outlived `stale_after`
    ///
    /// A running run without a start time is always stale.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: TimeDelta) -> bool {
        self.run.is_running()
            && self
                .run
                .started_at
                .is_none_or(|start| now - start > stale_after)
    }

    /// Whether the model already reflects a fully successful run
    pub fn is_fully_successful(&self) -> bool {
        self.run.overall_status == RunStatus::Success && self.all_steps_complete()
    }

    fn all_steps_complete(&self) -> bool {
        !self.catalog.is_empty()
            && self
                .catalog
                .steps()
                .iter()
                .all(|s| self.state_of(&s.id) == StepState::Complete)
    }

    /// Step counts for the current run
    pub fn progress(&self) -> Progress {
        let mut progress = Progress {
            total: self.catalog.len(),
            ..Progress::default()
        };

        for def in self.catalog.steps() {
            match self.state_of(&def.id) {
                StepState::Pending => progress.pending += 1,
                StepState::Running => progress.running += 1,
                StepState::Complete => progress.complete += 1,
                StepState::Failed => progress.failed += 1,
                StepState::Cancelled => progress.cancelled += 1,
            }
        }

        if progress.total > 0 {
            progress.percentage =
                (100.0 * progress.complete as f64 / progress.total as f64).round() as u32;
        }

        progress
    }

    /// Estimated time until the active run finishes
    ///
    /// Extrapolates linearly from elapsed time and the completed fraction.
    /// Before any step completes, falls back to the last successful run's
    /// duration spread evenly over the steps.
    pub fn estimated_time_remaining(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        if !self.run.is_running() {
            return None;
        }
        let last_duration = self.run.last_duration?;
        let started_at = self.run.started_at?;

        let progress = self.progress();
        if progress.total == 0 {
            return None;
        }

        let total = progress.total as f64;
        let complete = progress.complete as f64;
        let elapsed_ms = (now - started_at).num_milliseconds() as f64;

        let remaining_ms = if progress.complete > 0 {
            let fraction = complete / total;
            elapsed_ms / fraction - elapsed_ms
        } else {
            last_duration.num_milliseconds() as f64 / total * (total - complete)
        };

        if remaining_ms <= 0.0 || !remaining_ms.is_finite() {
            return None;
        }

        Some(TimeDelta::milliseconds(remaining_ms.round() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::StepDefinition;
    use chrono::TimeZone;

    fn catalog() -> Arc<StepCatalog> {
        Arc::new(
            StepCatalog::new(
                "p1",
                vec![
                    StepDefinition::new("A", "Alpha"),
                    StepDefinition::new("B", "Bravo"),
                    StepDefinition::new("C", "Charlie"),
                ],
            )
            .unwrap(),
        )
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap()
    }

    fn running_model() -> PipelineStatusModel {
        let mut model = PipelineStatusModel::new(catalog(), false);
        model.start_run(at(0)).unwrap();
        model
    }

    fn step(
        model: &mut PipelineStatusModel,
        id: &str,
        state: StepState,
        minute: u32,
    ) -> Result<Transition, ModelError> {
        model.apply_step_event(id, state, at(minute), None)
    }

    #[test]
    fn test_start_run_resets_steps() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Complete, 1).unwrap();
        model.reset_all();

        assert_eq!(model.start_run(at(5)).unwrap(), Transition::RunStarted);
        assert_eq!(model.status(), RunStatus::Running);
        assert_eq!(model.run().started_at, Some(at(5)));
        assert!(model.steps().iter().all(|s| s.state == StepState::Pending));
    }

    #[test]
    fn test_start_run_conflicts_when_running() {
        let mut model = running_model();
        let before = model.clone();

        let result = model.start_run(at(3));
        assert!(matches!(result, Err(ModelError::RunInProgress { .. })));
        assert_eq!(model, before);
    }

    #[test]
    fn test_all_steps_complete_transitions_to_success_once() {
        let mut model = running_model();
        model.fail_run(None);
        model.run.overall_status = RunStatus::Running;
        assert_eq!(model.retry_attempts(), 1);

        step(&mut model, "A", StepState::Complete, 1).unwrap();
        step(&mut model, "B", StepState::Complete, 2).unwrap();
        let last = step(&mut model, "C", StepState::Complete, 3).unwrap();

        assert_eq!(
            last,
            Transition::RunSucceeded {
                duration: Some(TimeDelta::minutes(3))
            }
        );
        assert_eq!(model.status(), RunStatus::Success);
        assert_eq!(model.retry_attempts(), 0);
        assert_eq!(model.run().completed_at, Some(at(3)));
        assert_eq!(model.run().last_duration, Some(TimeDelta::minutes(3)));

        // A late duplicate does not produce a second success
        let again = step(&mut model, "C", StepState::Complete, 4).unwrap();
        assert_eq!(
            again,
            Transition::StepUpdated {
                step_id: "C".to_string(),
                state: StepState::Complete
            }
        );
        assert_eq!(model.status(), RunStatus::Success);
    }

    #[test]
    fn test_failed_step_fails_run() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Running, 1).unwrap();
        step(&mut model, "A", StepState::Complete, 2).unwrap();
        step(&mut model, "B", StepState::Running, 3).unwrap();
        let transition = model
            .apply_step_event("B", StepState::Failed, at(4), Some("B".to_string()))
            .unwrap();

        assert_eq!(
            transition,
            Transition::RunFailed {
                step_id: Some("B".to_string()),
                retry_attempts: 1
            }
        );
        assert_eq!(model.status(), RunStatus::Failed);
        assert_eq!(model.state_of("A"), StepState::Complete);
        assert_eq!(model.state_of("B"), StepState::Failed);
        assert_eq!(model.state_of("C"), StepState::Pending);
        assert_eq!(model.current_step(), None);
        assert_eq!(model.steps()[1].error_message.as_deref(), Some("B"));
    }

    #[test]
    fn test_unknown_step_leaves_model_unchanged() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Running, 1).unwrap();
        let before = model.clone();
        let persisted_before = serde_json::to_string(&model.to_persisted()).unwrap();

        let result = step(&mut model, "Z", StepState::Running, 2);

        assert_eq!(
            result,
            Err(ModelError::UnknownStep {
                pipeline_id: "p1".to_string(),
                step_id: "Z".to_string()
            })
        );
        assert_eq!(model, before);
        assert_eq!(
            serde_json::to_string(&model.to_persisted()).unwrap(),
            persisted_before
        );
    }

    #[test]
    fn test_current_step_tracking() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Running, 1).unwrap();
        assert_eq!(model.current_step(), Some("A"));

        step(&mut model, "A", StepState::Complete, 2).unwrap();
        assert_eq!(model.current_step(), None);

        step(&mut model, "B", StepState::Running, 3).unwrap();
        assert_eq!(model.current_step(), Some("B"));
    }

    #[test]
    fn test_single_running_step() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Running, 1).unwrap();
        step(&mut model, "B", StepState::Running, 2).unwrap();

        assert_eq!(model.progress().running, 1);
        assert_eq!(model.state_of("A"), StepState::Complete);
        assert_eq!(model.current_step(), Some("B"));
    }

    #[test]
    fn test_out_of_order_event_for_same_step_is_ignored() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Complete, 5).unwrap();

        let late = step(&mut model, "A", StepState::Running, 4).unwrap();
        assert_eq!(late, Transition::Ignored(IgnoreReason::OutOfOrder));
        assert_eq!(model.state_of("A"), StepState::Complete);
    }

    #[test]
    fn test_cancel_marks_running_steps() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Complete, 1).unwrap();
        step(&mut model, "B", StepState::Running, 2).unwrap();

        let transition = model.cancel_run();
        assert_eq!(
            transition,
            Transition::RunCancelled {
                cancelled_steps: vec!["B".to_string()]
            }
        );
        assert_eq!(model.status(), RunStatus::Idle);
        assert_eq!(model.state_of("B"), StepState::Cancelled);
        assert_eq!(model.current_step(), None);
    }

    #[test]
    fn test_late_running_event_after_cancel_is_ignored() {
        let mut model = running_model();
        step(&mut model, "B", StepState::Running, 2).unwrap();
        model.cancel_run();

        let late = step(&mut model, "B", StepState::Running, 3).unwrap();
        assert_eq!(late, Transition::Ignored(IgnoreReason::RunNotActive));
        assert_eq!(model.state_of("B"), StepState::Cancelled);
    }

    #[test]
    fn test_terminal_event_after_cancel_updates_bookkeeping_only() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Running, 1).unwrap();
        model.cancel_run();

        let transition = step(&mut model, "A", StepState::Failed, 2).unwrap();
        assert!(matches!(transition, Transition::StepUpdated { .. }));
        assert_eq!(model.state_of("A"), StepState::Failed);
        assert_eq!(model.status(), RunStatus::Idle);
        assert_eq!(model.retry_attempts(), 0);
    }

    #[test]
    fn test_events_after_success_keep_steps_complete() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Complete, 1).unwrap();
        step(&mut model, "B", StepState::Complete, 2).unwrap();
        step(&mut model, "C", StepState::Complete, 3).unwrap();
        assert_eq!(model.status(), RunStatus::Success);

        for state in [StepState::Failed, StepState::Cancelled, StepState::Running] {
            let late = step(&mut model, "B", state, 4).unwrap();
            assert_eq!(late, Transition::Ignored(IgnoreReason::RunNotActive));
        }

        assert_eq!(model.state_of("B"), StepState::Complete);
        assert_eq!(model.retry_attempts(), 0);
        assert!(model.is_fully_successful());
    }

    #[test]
    fn test_reset_all() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Complete, 1).unwrap();
        step(&mut model, "B", StepState::Running, 2).unwrap();
        model.run.retry_attempts = 3;

        assert_eq!(model.reset_all(), Transition::RunReset);
        assert_eq!(model.status(), RunStatus::Idle);
        assert_eq!(model.retry_attempts(), 0);
        for id in ["A", "B", "C"] {
            assert_eq!(model.state_of(id), StepState::Pending);
        }
        assert!(model.to_persisted().step_states.is_empty());
    }

    #[test]
    fn test_fail_run_attribution() {
        let mut model = running_model();
        let transition = model.fail_run(Some("Bravo"));
        assert_eq!(
            transition,
            Transition::RunFailed {
                step_id: Some("B".to_string()),
                retry_attempts: 1
            }
        );

        let transition = model.fail_run(Some("nothing like it"));
        assert_eq!(
            transition,
            Transition::RunFailed {
                step_id: None,
                retry_attempts: 2
            }
        );
    }

    #[test]
    fn test_progress_percentage() {
        let mut model = running_model();
        assert_eq!(model.progress().percentage, 0);

        step(&mut model, "A", StepState::Complete, 1).unwrap();
        let progress = model.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.complete, 1);
        assert_eq!(progress.pending, 2);
        assert_eq!(progress.percentage, 33);

        step(&mut model, "B", StepState::Complete, 2).unwrap();
        assert_eq!(model.progress().percentage, 67);
    }

    #[test]
    fn test_progress_empty_catalog() {
        let catalog = Arc::new(StepCatalog::new("empty", vec![]).unwrap());
        let model = PipelineStatusModel::new(catalog, false);
        let progress = model.progress();
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0);
    }

    #[test]
    fn test_estimated_time_remaining() {
        let mut model = running_model();
        assert_eq!(model.estimated_time_remaining(at(1)), None);

        model.run.last_duration = Some(TimeDelta::minutes(30));
        // Nothing complete yet: last duration spread over three steps
        assert_eq!(
            model.estimated_time_remaining(at(1)),
            Some(TimeDelta::minutes(30))
        );

        step(&mut model, "A", StepState::Complete, 10).unwrap();
        // One third done after 10 minutes: 20 minutes to go
        assert_eq!(
            model.estimated_time_remaining(at(10)),
            Some(TimeDelta::minutes(20))
        );
    }

    #[test]
    fn test_estimated_time_remaining_none_when_not_positive() {
        let mut model = running_model();
        model.run.last_duration = Some(TimeDelta::minutes(30));
        step(&mut model, "A", StepState::Complete, 10).unwrap();

        // Clock behind the run start
        assert_eq!(
            model.estimated_time_remaining(at(0) - TimeDelta::minutes(5)),
            None
        );

        // Every step complete on a restored running record
        let mut state = model.to_persisted();
        for id in ["B", "C"] {
            state.step_states.insert(id.to_string(), StepState::Complete);
        }
        let restored = PipelineStatusModel::from_persisted(catalog(), false, state);
        assert_eq!(restored.status(), RunStatus::Running);
        assert_eq!(restored.estimated_time_remaining(at(20)), None);
    }

    #[test]
    fn test_from_persisted_drops_out_of_range_duration() {
        let state = PersistedRunState {
            last_run_duration: Some(i64::MIN),
            ..PersistedRunState::default()
        };
        let model = PipelineStatusModel::from_persisted(catalog(), false, state);
        assert_eq!(model.run().last_duration, None);
    }

    #[test]
    fn test_estimated_time_remaining_not_running() {
        let mut model = PipelineStatusModel::new(catalog(), false);
        model.run.last_duration = Some(TimeDelta::minutes(30));
        assert_eq!(model.estimated_time_remaining(at(1)), None);
    }

    #[test]
    fn test_persisted_round_trip() {
        let mut model = running_model();
        step(&mut model, "A", StepState::Complete, 1).unwrap();
        step(&mut model, "B", StepState::Running, 2).unwrap();
        model.run.retry_attempts = 2;

        let restored =
            PipelineStatusModel::from_persisted(catalog(), false, model.to_persisted());

        assert_eq!(restored.status(), model.status());
        assert_eq!(restored.retry_attempts(), 2);
        assert_eq!(restored.steps(), model.steps());
        assert_eq!(restored.current_step(), Some("B"));
    }

    #[test]
    fn test_from_persisted_drops_unknown_steps() {
        let mut state = PersistedRunState::default();
        state.step_states.insert("A".to_string(), StepState::Complete);
        state.step_states.insert("Z".to_string(), StepState::Running);

        let model = PipelineStatusModel::from_persisted(catalog(), false, state);
        assert_eq!(model.state_of("A"), StepState::Complete);
        assert!(!model.to_persisted().step_states.contains_key("Z"));
    }

    #[test]
    fn test_is_stale() {
        let model = running_model();
        let six_hours = TimeDelta::hours(6);
        assert!(!model.is_stale(at(0) + TimeDelta::hours(5), six_hours));
        assert!(model.is_stale(at(0) + TimeDelta::hours(7), six_hours));

        let idle = PipelineStatusModel::new(catalog(), false);
        assert!(!idle.is_stale(at(0) + TimeDelta::hours(7), six_hours));
    }

    #[test]
    fn test_clear_retry_budget() {
        let mut model = running_model();
        assert_eq!(
            model.clear_retry_budget(),
            Transition::Ignored(IgnoreReason::AlreadyApplied)
        );
        model.fail_run(None);
        assert_eq!(model.clear_retry_budget(), Transition::RetryBudgetCleared);
        assert_eq!(model.retry_attempts(), 0);
    }
}
