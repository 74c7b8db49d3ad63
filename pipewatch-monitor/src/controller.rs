//! Pipeline controller
//!
//! The single owner of a pipeline's tracker. User commands, realtime events,
//! retry timers and reconcile ticks all arrive on one queue and are handled
//! one at a time, so model mutations never interleave. Backend calls are the
//! only suspension points inside a handler.
//!
//! Backend failures never escape the controller: they are converted into
//! notifications at the call site.

use chrono::{DateTime, Utc};
use pipewatch_client::PipelineBackend;
use pipewatch_core::ModelError;
use pipewatch_core::domain::StepCatalog;
use pipewatch_core::dto::{CommandResponse, RealtimeEvent};
use pipewatch_core::model::{ModelEvent, PipelineStatusModel, Transition};
use pipewatch_core::store::StateStore;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::channel::ChannelHandle;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::retry::{RetryDecision, RetryScheduler};
use crate::tracker::RunTracker;

const QUEUE_CAPACITY: usize = 64;

/// Operator commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Start a run
    Run,
    /// Cancel the active run
    Cancel,
    /// Cancel the active run if any, then start a fresh one
    Restart,
    /// Reset every step to pending on the backend and locally
    Reset,
    /// Reconcile against the backend snapshot now
    Reconcile,
}

impl std::fmt::Display for UserCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserCommand::Run => write!(f, "run"),
            UserCommand::Cancel => write!(f, "cancel"),
            UserCommand::Restart => write!(f, "restart"),
            UserCommand::Reset => write!(f, "reset"),
            UserCommand::Reconcile => write!(f, "reconcile"),
        }
    }
}

/// Lifecycle of the realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connected,
    Disconnected,
    /// Reconnect attempts exhausted; no further realtime updates
    GaveUp,
}

/// Everything the controller reacts to
#[derive(Debug)]
pub enum ControllerEvent {
    Command(UserCommand),
    Realtime(RealtimeEvent),
    Channel(ChannelStatus),
    RetryDue { token: u64 },
    ReconcileTick,
    Shutdown,
}

/// What the view layer renders
#[derive(Debug, Clone)]
pub struct StatusView {
    pub model: PipelineStatusModel,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy)]
enum BackendCommand {
    Start,
    Cancel,
    Reset,
}

impl BackendCommand {
    fn action(self) -> &'static str {
        match self {
            BackendCommand::Start => "start",
            BackendCommand::Cancel => "cancel",
            BackendCommand::Reset => "reset",
        }
    }
}

pub struct PipelineController {
    config: MonitorConfig,
    tracker: RunTracker,
    backend: Arc<dyn PipelineBackend>,
    reconciler: Reconciler,
    retry: RetryScheduler,
    notifier: Arc<dyn Notifier>,
    events: mpsc::Sender<ControllerEvent>,
    view: watch::Sender<StatusView>,
    connected: bool,
    ever_connected: bool,
}

impl PipelineController {
    /// Loads the pipeline's persisted state and builds the controller
    ///
    /// A run left `running` for longer than the staleness threshold is reset
    /// here and reported with a warning. The returned receiver is the
    /// controller's event queue, to be passed to [`PipelineController::run`].
    pub fn new(
        config: MonitorConfig,
        catalog: Arc<StepCatalog>,
        store: Arc<dyn StateStore>,
        backend: Arc<dyn PipelineBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(Self, mpsc::Receiver<ControllerEvent>), MonitorError> {
        config.validate()?;
        if catalog.pipeline_id != config.pipeline_id {
            return Err(MonitorError::Config(format!(
                "catalog is for pipeline '{}' but the monitor observes '{}'",
                catalog.pipeline_id, config.pipeline_id
            )));
        }

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let mut tracker = RunTracker::load(catalog, &config.recovery, store);

        if let Some(stale) = tracker.recover_stale(Utc::now(), &config.recovery) {
            notifier.notify(Notification::transient(
                NotificationLevel::Warning,
                stale.to_string(),
                config.notification_duration,
            ));
        }

        let (view, _) = watch::channel(StatusView {
            model: tracker.model().clone(),
            next_retry_at: None,
            connected: false,
        });

        let controller = Self {
            reconciler: Reconciler::new(backend.clone()),
            retry: RetryScheduler::new(tx.clone()),
            config,
            tracker,
            backend,
            notifier,
            events: tx,
            view,
            connected: false,
            ever_connected: false,
        };

        Ok((controller, rx))
    }

    /// Sender for the controller queue
    pub fn sender(&self) -> mpsc::Sender<ControllerEvent> {
        self.events.clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.view.subscribe()
    }

    pub fn model(&self) -> &PipelineStatusModel {
        self.tracker.model()
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.retry.next_retry_at()
    }

    /// Runs the event loop until a shutdown event arrives
    ///
    /// Reconciles once on entry and then every `reconcile_interval`; each
    /// reconciliation also resets a run that has gone stale. The channel
    /// handle is held for the lifetime of the loop.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ControllerEvent>,
        channel: Option<ChannelHandle>,
    ) {
        let _channel = channel;

        info!(
            "Monitoring pipeline '{}' (reconcile interval: {:?})",
            self.config.pipeline_id, self.config.reconcile_interval
        );

        self.reconcile().await;
        self.publish();

        let mut ticker = tokio::time::interval(self.config.reconcile_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the load reconcile covers it
        ticker.tick().await;

        loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = ticker.tick() => ControllerEvent::ReconcileTick,
            };

            if !self.handle(event).await {
                break;
            }
        }

        info!("Stopped monitoring pipeline '{}'", self.config.pipeline_id);
    }

    /// Handles one event. Returns false when the loop should stop.
    pub async fn handle(&mut self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::Command(command) => {
                if let Err(e) = self.dispatch(command).await {
                    self.report(&e);
                }
            }
            ControllerEvent::Realtime(event) => self.on_realtime(event),
            ControllerEvent::Channel(status) => self.on_channel(status).await,
            ControllerEvent::RetryDue { token } => {
                if self.retry.take_fired(token) {
                    self.automatic_retry().await;
                } else {
                    debug!("Ignoring retry {} that is no longer scheduled", token);
                }
            }
            ControllerEvent::ReconcileTick => self.reconcile().await,
            ControllerEvent::Shutdown => return false,
        }

        self.publish();
        true
    }

    /// Executes an operator command
    ///
    /// Failures are returned to the caller; [`PipelineController::handle`]
    /// turns them into notifications.
    pub async fn dispatch(&mut self, command: UserCommand) -> Result<(), MonitorError> {
        debug!("Dispatching '{}' for '{}'", command, self.config.pipeline_id);

        let result = match command {
            UserCommand::Run => self.start_run().await,
            UserCommand::Cancel => self.cancel_run().await,
            UserCommand::Restart => self.restart_run().await,
            UserCommand::Reset => self.reset_run().await,
            UserCommand::Reconcile => {
                self.reconcile().await;
                Ok(())
            }
        };

        self.publish();
        result
    }

    // =============================================================================
    // Commands
    // =============================================================================

    async fn start_run(&mut self) -> Result<(), MonitorError> {
        self.ensure_not_running()?;
        self.retry.cancel();

        let response = self.send(BackendCommand::Start).await?;
        self.apply(ModelEvent::StartRun { at: Utc::now() })?;
        self.notify(NotificationLevel::Info, non_empty(response.message, "Pipeline started"));
        Ok(())
    }

    async fn cancel_run(&mut self) -> Result<(), MonitorError> {
        self.retry.cancel();

        let response = self.send(BackendCommand::Cancel).await?;
        self.apply(ModelEvent::CancelRun)?;
        self.notify(NotificationLevel::Info, non_empty(response.message, "Pipeline cancelled"));
        Ok(())
    }

    async fn restart_run(&mut self) -> Result<(), MonitorError> {
        self.retry.cancel();

        if self.tracker.model().run().is_running() {
            self.send(BackendCommand::Cancel).await?;
            self.apply(ModelEvent::CancelRun)?;
        }

        let response = self.send(BackendCommand::Start).await?;
        self.apply(ModelEvent::StartRun { at: Utc::now() })?;
        self.notify(NotificationLevel::Info, non_empty(response.message, "Pipeline restarted"));
        Ok(())
    }

    async fn reset_run(&mut self) -> Result<(), MonitorError> {
        self.retry.cancel();

        let response = self.send(BackendCommand::Reset).await?;
        self.apply(ModelEvent::ResetAll)?;
        self.notify(NotificationLevel::Info, non_empty(response.message, "Pipeline reset"));
        Ok(())
    }

    async fn automatic_retry(&mut self) {
        if self.tracker.model().run().is_running() {
            debug!("Skipping automatic retry: a run is already active");
            return;
        }

        let attempts = self.tracker.model().retry_attempts();
        info!(
            "Automatic retry of '{}' after {} failure(s)",
            self.config.pipeline_id, attempts
        );

        match self.send(BackendCommand::Start).await {
            Ok(_) => {
                if let Err(e) = self.apply(ModelEvent::StartRun { at: Utc::now() }) {
                    warn!("Automatic retry could not start locally: {}", e);
                    return;
                }
                self.notify(
                    NotificationLevel::Info,
                    format!(
                        "Automatic retry {} of {} started",
                        attempts,
                        self.config.recovery.max_retry_attempts.saturating_sub(1)
                    ),
                );
            }
            Err(e) => {
                // A failed start request is not retried again
                warn!("Automatic retry of '{}' failed: {}", self.config.pipeline_id, e);
                self.notify(
                    level_for(&e),
                    format!("Automatic retry failed: {}. Start the pipeline manually", e),
                );
            }
        }
    }

    // =============================================================================
    // Inbound events
    // =============================================================================

    fn on_realtime(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::StatusUpdate(update) => {
                // Unknown steps are logged by the tracker and not applied
                let _ = self.apply(ModelEvent::StepUpdate {
                    step_id: update.step_id,
                    state: update.status,
                    timestamp: update.timestamp,
                    error_message: update.error_message,
                });
            }
            RealtimeEvent::PipelineReset(reset) => {
                self.retry.cancel();
                if self.apply(ModelEvent::ResetAll).is_ok() {
                    self.notify(
                        NotificationLevel::Info,
                        reset
                            .message
                            .unwrap_or_else(|| "Pipeline was reset by another client".to_string()),
                    );
                }
            }
        }
    }

    async fn on_channel(&mut self, status: ChannelStatus) {
        match status {
            ChannelStatus::Connected => {
                let reconnected = self.ever_connected && !self.connected;
                self.connected = true;
                self.ever_connected = true;
                if reconnected {
                    // Events may have been missed while disconnected
                    self.reconcile().await;
                }
            }
            ChannelStatus::Disconnected => self.connected = false,
            ChannelStatus::GaveUp => {
                self.connected = false;
                self.notify(
                    NotificationLevel::Warning,
                    "Lost the realtime connection to the backend; status updates rely on periodic reconciliation",
                );
            }
        }
    }

    async fn reconcile(&mut self) {
        match self
            .reconciler
            .reconcile(&mut self.tracker, Utc::now())
            .await
        {
            Ok(ReconcileOutcome::Corrected { .. }) => {
                self.retry.cancel();
                self.notify(
                    NotificationLevel::Success,
                    "Pipeline completed while this client was away; status updated",
                );
            }
            Ok(outcome) => debug!("Reconciliation: {:?}", outcome),
            Err(e) => warn!("Skipping reconciliation: {}", e),
        }

        if let Some(stale) = self
            .tracker
            .recover_stale(Utc::now(), &self.config.recovery)
        {
            self.retry.cancel();
            warn!("{}", stale);
            self.notify(NotificationLevel::Warning, stale.to_string());
        }
    }

    // =============================================================================
    // Effects
    // =============================================================================

    /// Applies a model event through the tracker and runs its side effects
    fn apply(&mut self, event: ModelEvent) -> Result<Transition, MonitorError> {
        let transition = self.tracker.apply(event)?;
        self.after_transition(&transition);
        Ok(transition)
    }

    fn after_transition(&mut self, transition: &Transition) {
        match transition {
            Transition::RunFailed {
                step_id,
                retry_attempts,
            } => self.on_failure(step_id.as_deref(), *retry_attempts),
            Transition::RunSucceeded { .. } => {
                self.retry.cancel();
                self.notify(NotificationLevel::Success, "Pipeline completed successfully");
            }
            Transition::RunCancelled { .. } | Transition::RunReset => {
                self.retry.cancel();
            }
            _ => {}
        }
    }

    fn on_failure(&mut self, step_id: Option<&str>, attempts: u32) {
        let location = step_id
            .and_then(|id| self.tracker.model().catalog().get(id))
            .map(|step| format!(" at step '{}'", step.display_name))
            .unwrap_or_default();

        match RetryDecision::decide(&self.config.recovery, attempts) {
            RetryDecision::Schedule { delay } => {
                let due = self.retry.schedule(delay);
                self.notify(
                    NotificationLevel::Warning,
                    format!(
                        "Pipeline failed{}; automatic retry scheduled for {}",
                        location,
                        due.format("%H:%M")
                    ),
                );
            }
            RetryDecision::Exhausted => {
                self.retry.cancel();
                let exhausted = MonitorError::RetryBudgetExhausted {
                    pipeline_id: self.config.pipeline_id.clone(),
                    attempts,
                };
                warn!("{}", exhausted);
                self.notifier.notify(Notification::blocking(
                    NotificationLevel::Error,
                    exhausted.to_string(),
                ));
                let _ = self.apply(ModelEvent::ClearRetryBudget);
            }
        }
    }

    async fn send(&self, command: BackendCommand) -> Result<CommandResponse, MonitorError> {
        let id = self.config.pipeline_id.as_str();
        let response = match command {
            BackendCommand::Start => self.backend.start(id).await?,
            BackendCommand::Cancel => self.backend.cancel(id).await?,
            BackendCommand::Reset => self.backend.reset(id).await?,
        };

        if !response.success {
            return Err(MonitorError::Rejected {
                action: command.action(),
                message: response.message,
            });
        }
        Ok(response)
    }

    fn ensure_not_running(&self) -> Result<(), ModelError> {
        let run = self.tracker.model().run();
        if run.is_running() {
            return Err(ModelError::RunInProgress {
                pipeline_id: run.pipeline_id.clone(),
                started_at: run.started_at,
            });
        }
        Ok(())
    }

    fn report(&self, error: &MonitorError) {
        warn!("{}", error);
        self.notify(level_for(error), error.to_string());
    }

    fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        self.notifier.notify(Notification::transient(
            level,
            message,
            self.config.notification_duration,
        ));
    }

    fn publish(&self) {
        self.view.send_replace(StatusView {
            model: self.tracker.model().clone(),
            next_retry_at: self.retry.next_retry_at(),
            connected: self.connected,
        });
    }
}

fn level_for(error: &MonitorError) -> NotificationLevel {
    match error {
        MonitorError::Transport(_) => NotificationLevel::Error,
        _ => NotificationLevel::Warning,
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
