//! Snapshot reconciliation
//!
//! Realtime events can be missed while the client is away or disconnected.
//! The backend's status snapshot is authoritative: when it reports every
//! declared step complete and the local model does not reflect a successful
//! run, the local run is completed from the snapshot's timestamps.

use chrono::{DateTime, TimeDelta, Utc};
use pipewatch_client::PipelineBackend;
use pipewatch_core::dto::PipelineSnapshot;
use pipewatch_core::model::{ModelEvent, PipelineStatusModel, Transition};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::MonitorError;
use crate::tracker::RunTracker;

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Local state was completed from the snapshot
    Corrected { duration: Option<TimeDelta> },
    /// Snapshot and model already agree on a successful run
    AlreadyConsistent,
    /// Snapshot does not show a finished run; nothing to correct
    NotComplete,
    /// Snapshot has no entry for the pipeline
    PipelineMissing,
}

/// Computes the correction a snapshot implies for the model, if any
///
/// Completion time is the latest step timestamp in the snapshot (or `now`
/// when the snapshot carries none). The start time is the local start time,
/// falling back to the earliest step timestamp.
pub fn plan_correction(
    model: &PipelineStatusModel,
    snapshot: &PipelineSnapshot,
    now: DateTime<Utc>,
) -> Option<ModelEvent> {
    let catalog = model.catalog();
    if !snapshot.all_complete(catalog) || model.is_fully_successful() {
        return None;
    }

    let window = snapshot.time_window(catalog);
    let completed_at = window.map(|(_, max)| max).unwrap_or(now);
    let started_at = model.run().started_at.or(window.map(|(min, _)| min));

    Some(ModelEvent::CompleteRun {
        started_at,
        completed_at,
    })
}

pub struct Reconciler {
    backend: Arc<dyn PipelineBackend>,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn PipelineBackend>) -> Self {
        Self { backend }
    }

    /// Fetches the snapshot and corrects the tracker's model
    ///
    /// Fetch failures are returned as [`MonitorError::Reconciliation`] and
    /// leave the model untouched.
    pub async fn reconcile(
        &self,
        tracker: &mut RunTracker,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, MonitorError> {
        let pipeline_id = tracker.model().pipeline_id().to_string();

        let snapshots = self
            .backend
            .snapshot()
            .await
            .map_err(|e| MonitorError::Reconciliation(e.to_string()))?;

        let Some(snapshot) = snapshots.iter().find(|s| s.pipeline_id == pipeline_id) else {
            debug!("Snapshot has no entry for pipeline '{}'", pipeline_id);
            return Ok(ReconcileOutcome::PipelineMissing);
        };

        if !snapshot.all_complete(tracker.model().catalog()) {
            return Ok(ReconcileOutcome::NotComplete);
        }

        let Some(correction) = plan_correction(tracker.model(), snapshot, now) else {
            return Ok(ReconcileOutcome::AlreadyConsistent);
        };

        match tracker.apply(correction)? {
            Transition::RunSucceeded { duration } => {
                info!(
                    "Reconciled '{}': backend reports the run completed",
                    pipeline_id
                );
                Ok(ReconcileOutcome::Corrected { duration })
            }
            other => Err(MonitorError::Reconciliation(format!(
                "unexpected transition {:?} while completing '{}'",
                other, pipeline_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, snapshot};
    use chrono::TimeZone;
    use pipewatch_core::RecoveryPolicy;
    use pipewatch_core::domain::{RunStatus, StepCatalog, StepDefinition, StepState};
    use pipewatch_core::store::{MemoryStore, StateStore};

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

    fn tracker(store: Arc<dyn StateStore>) -> RunTracker {
        RunTracker::load(catalog(), &RecoveryPolicy::default(), store)
    }

    fn all_complete() -> PipelineSnapshot {
        snapshot(
            "p1",
            &[
                ("A", StepState::Complete, Some(at(2))),
                ("B", StepState::Complete, Some(at(9))),
                ("C", StepState::Complete, Some(at(5))),
            ],
        )
    }

    #[test]
    fn test_plan_uses_snapshot_window() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store);

        let plan = plan_correction(tracker.model(), &all_complete(), at(30));
        assert_eq!(
            plan,
            Some(ModelEvent::CompleteRun {
                started_at: Some(at(2)),
                completed_at: at(9),
            })
        );
    }

    #[test]
    fn test_plan_prefers_local_start() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = tracker(store);
        tracker.apply(ModelEvent::StartRun { at: at(0) }).unwrap();

        let plan = plan_correction(tracker.model(), &all_complete(), at(30));
        assert_eq!(
            plan,
            Some(ModelEvent::CompleteRun {
                started_at: Some(at(0)),
                completed_at: at(9),
            })
        );
    }

    #[test]
    fn test_plan_without_timestamps_uses_now() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store);
        let bare = snapshot(
            "p1",
            &[
                ("A", StepState::Complete, None),
                ("B", StepState::Complete, None),
                ("C", StepState::Complete, None),
            ],
        );

        let plan = plan_correction(tracker.model(), &bare, at(30));
        assert_eq!(
            plan,
            Some(ModelEvent::CompleteRun {
                started_at: None,
                completed_at: at(30),
            })
        );
    }

    #[tokio::test]
    async fn test_reconcile_corrects_missed_completion() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let mut tracker = tracker(store.clone());
        tracker.apply(ModelEvent::StartRun { at: at(0) }).unwrap();

        let backend = Arc::new(MockBackend::new());
        backend.set_snapshots(vec![all_complete()]);
        let reconciler = Reconciler::new(backend);

        let outcome = reconciler.reconcile(&mut tracker, at(30)).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Corrected {
                duration: Some(TimeDelta::minutes(9))
            }
        );
        assert_eq!(tracker.model().status(), RunStatus::Success);
        assert_eq!(tracker.model().run().completed_at, Some(at(9)));

        let reloaded = RunTracker::load(catalog(), &RecoveryPolicy::default(), store);
        assert_eq!(reloaded.model().status(), RunStatus::Success);
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_idempotent() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let mut tracker = tracker(store.clone());
        tracker.apply(ModelEvent::StartRun { at: at(0) }).unwrap();

        let backend = Arc::new(MockBackend::new());
        backend.set_snapshots(vec![all_complete()]);
        let reconciler = Reconciler::new(backend);

        reconciler.reconcile(&mut tracker, at(30)).await.unwrap();
        let after_first = tracker.model().clone();
        let stored_first = store.read("pipeline:p1").unwrap();

        let outcome = reconciler.reconcile(&mut tracker, at(31)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyConsistent);
        assert_eq!(tracker.model(), &after_first);
        assert_eq!(store.read("pipeline:p1").unwrap(), stored_first);
    }

    #[tokio::test]
    async fn test_incomplete_snapshot_leaves_model() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = tracker(store);
        tracker.apply(ModelEvent::StartRun { at: at(0) }).unwrap();
        let before = tracker.model().clone();

        let backend = Arc::new(MockBackend::new());
        backend.set_snapshots(vec![snapshot(
            "p1",
            &[
                ("A", StepState::Complete, Some(at(2))),
                ("B", StepState::Running, Some(at(3))),
            ],
        )]);
        let reconciler = Reconciler::new(backend);

        let outcome = reconciler.reconcile(&mut tracker, at(30)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotComplete);
        assert_eq!(tracker.model(), &before);
    }

    #[tokio::test]
    async fn test_missing_pipeline_and_fetch_failure() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = tracker(store);

        let backend = Arc::new(MockBackend::new());
        backend.set_snapshots(vec![snapshot("other", &[])]);
        let reconciler = Reconciler::new(backend.clone());

        let outcome = reconciler.reconcile(&mut tracker, at(30)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::PipelineMissing);

        backend.set_unavailable(true);
        let result = reconciler.reconcile(&mut tracker, at(31)).await;
        assert!(matches!(result, Err(MonitorError::Reconciliation(_))));
        assert_eq!(tracker.model().status(), RunStatus::Idle);
    }
}
