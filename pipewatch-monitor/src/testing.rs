//! Test doubles for the backend seams

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use pipewatch_client::{ClientError, EventSource, EventStream, PipelineBackend};
use pipewatch_core::domain::StepState;
use pipewatch_core::dto::{
    CommandResponse, PipelineReset, PipelineSnapshot, RealtimeEvent, SnapshotStep, StatusUpdate,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::notify::{Notification, NotificationLevel, Notifier};

pub fn snapshot(
    pipeline_id: &str,
    steps: &[(&str, StepState, Option<DateTime<Utc>>)],
) -> PipelineSnapshot {
    PipelineSnapshot {
        pipeline_id: pipeline_id.to_string(),
        step_statuses: steps
            .iter()
            .map(|(id, status, timestamp)| {
                (
                    id.to_string(),
                    SnapshotStep {
                        status: *status,
                        timestamp: *timestamp,
                        error_message: None,
                    },
                )
            })
            .collect(),
    }
}

pub fn status_update(
    pipeline_id: &str,
    step_id: &str,
    status: StepState,
    timestamp: DateTime<Utc>,
) -> RealtimeEvent {
    RealtimeEvent::StatusUpdate(StatusUpdate {
        pipeline_id: pipeline_id.to_string(),
        step_id: step_id.to_string(),
        status,
        timestamp,
        error_message: None,
    })
}

pub fn pipeline_reset(pipeline_id: &str) -> RealtimeEvent {
    RealtimeEvent::PipelineReset(PipelineReset {
        pipeline_id: pipeline_id.to_string(),
        message: Some("reset by another client".to_string()),
    })
}

/// Backend that records calls and answers from configured state
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<&'static str>>,
    rejection: Mutex<Option<String>>,
    unavailable: AtomicBool,
    snapshots: Mutex<Vec<PipelineSnapshot>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Answer commands with `success: false` and this message
    pub fn reject_with(&self, message: Option<&str>) {
        *self.rejection.lock().unwrap() = message.map(str::to_string);
    }

    /// Fail every call with a 503
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_snapshots(&self, snapshots: Vec<PipelineSnapshot>) {
        *self.snapshots.lock().unwrap() = snapshots;
    }

    fn command(&self, action: &'static str) -> pipewatch_client::Result<CommandResponse> {
        self.calls.lock().unwrap().push(action);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(503, "backend unavailable"));
        }
        Ok(match self.rejection.lock().unwrap().clone() {
            Some(message) => CommandResponse {
                success: false,
                message,
            },
            None => CommandResponse {
                success: true,
                message: format!("{} accepted", action),
            },
        })
    }
}

#[async_trait]
impl PipelineBackend for MockBackend {
    async fn start(&self, _pipeline_id: &str) -> pipewatch_client::Result<CommandResponse> {
        self.command("start")
    }

    async fn cancel(&self, _pipeline_id: &str) -> pipewatch_client::Result<CommandResponse> {
        self.command("cancel")
    }

    async fn reset(&self, _pipeline_id: &str) -> pipewatch_client::Result<CommandResponse> {
        self.command("reset")
    }

    async fn snapshot(&self) -> pipewatch_client::Result<Vec<PipelineSnapshot>> {
        self.calls.lock().unwrap().push("snapshot");
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::api_error(503, "backend unavailable"));
        }
        Ok(self.snapshots.lock().unwrap().clone())
    }
}

enum Connection {
    Refused,
    Stream {
        items: Vec<pipewatch_client::Result<RealtimeEvent>>,
        hold_open: bool,
    },
}

/// Event source that replays one scripted connection per subscribe
///
/// Subscribing after the script runs out is refused.
#[derive(Default)]
pub struct ScriptedSource {
    connections: Mutex<VecDeque<Connection>>,
    subscribes: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refuse(&self) {
        self.connections.lock().unwrap().push_back(Connection::Refused);
    }

    /// A connection that delivers `items` and then closes
    pub fn deliver(&self, items: Vec<pipewatch_client::Result<RealtimeEvent>>) {
        self.connections.lock().unwrap().push_back(Connection::Stream {
            items,
            hold_open: false,
        });
    }

    /// A connection that delivers `items` and then stays open
    pub fn deliver_and_hold(&self, items: Vec<pipewatch_client::Result<RealtimeEvent>>) {
        self.connections.lock().unwrap().push_back(Connection::Stream {
            items,
            hold_open: true,
        });
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn subscribe(&self) -> pipewatch_client::Result<EventStream> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let next = self.connections.lock().unwrap().pop_front();
        match next {
            Some(Connection::Stream { items, hold_open }) => {
                let items = stream::iter(items);
                if hold_open {
                    Ok(items.chain(stream::pending()).boxed())
                } else {
                    Ok(items.boxed())
                }
            }
            Some(Connection::Refused) | None => {
                Err(ClientError::api_error(502, "connection refused"))
            }
        }
    }
}

/// Notifier that keeps every notification
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.notifications()
            .iter()
            .filter(|n| n.level == level)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
