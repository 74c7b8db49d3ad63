//! Realtime status channel
//!
//! Keeps a subscription to the backend's event stream open and forwards the
//! events that concern the observed pipeline to the controller queue.
//! Reconnects with a fixed delay; after `max_attempts` consecutive failed
//! connection attempts it reports [`ChannelStatus::GaveUp`] and stops.

use futures::StreamExt;
use pipewatch_client::{EventSource, EventStream};
use pipewatch_core::domain::StepCatalog;
use pipewatch_core::dto::RealtimeEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ReconnectPolicy;
use crate::controller::{ChannelStatus, ControllerEvent};

/// Handle to the running channel task; dropping it closes the channel
pub struct ChannelHandle {
    task: JoinHandle<()>,
}

impl ChannelHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct RealtimeStatusChannel {
    source: Arc<dyn EventSource>,
    catalog: Arc<StepCatalog>,
    reconnect: ReconnectPolicy,
    events: mpsc::Sender<ControllerEvent>,
}

impl RealtimeStatusChannel {
    pub fn new(
        source: Arc<dyn EventSource>,
        catalog: Arc<StepCatalog>,
        reconnect: ReconnectPolicy,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            source,
            catalog,
            reconnect,
            events,
        }
    }

    /// Starts the connection loop on the runtime
    pub fn spawn(self) -> ChannelHandle {
        ChannelHandle {
            task: tokio::spawn(self.run()),
        }
    }

    async fn run(self) {
        let pipeline_id = self.catalog.pipeline_id.clone();
        let mut failures = 0u32;

        loop {
            match self.source.subscribe().await {
                Ok(stream) => {
                    if failures > 0 {
                        info!(
                            "Realtime channel for '{}' reconnected after {} failed attempt(s)",
                            pipeline_id, failures
                        );
                    }
                    failures = 0;

                    if !self.report(ChannelStatus::Connected).await {
                        return;
                    }
                    if !self.consume(stream).await {
                        return;
                    }
                    if !self.report(ChannelStatus::Disconnected).await {
                        return;
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Realtime channel for '{}' failed to connect (attempt {}/{}): {}",
                        pipeline_id, failures, self.reconnect.max_attempts, e
                    );

                    if failures >= self.reconnect.max_attempts {
                        warn!(
                            "Giving up on realtime channel for '{}' after {} attempts",
                            pipeline_id, failures
                        );
                        self.report(ChannelStatus::GaveUp).await;
                        return;
                    }
                }
            }

            debug!("Reconnecting in {:?}", self.reconnect.delay);
            tokio::time::sleep(self.reconnect.delay).await;
        }
    }

    /// Forwards events until the stream ends
    ///
    /// Returns false once the controller is gone.
    async fn consume(&self, mut stream: EventStream) -> bool {
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if !self.accepts(&event) {
                        continue;
                    }
                    if self
                        .events
                        .send(ControllerEvent::Realtime(event))
                        .await
                        .is_err()
                    {
                        return false;
                    }
                }
                Err(e) if e.is_transport() => {
                    warn!("Realtime channel disconnected: {}", e);
                    break;
                }
                Err(e) => warn!("Skipping malformed realtime event: {}", e),
            }
        }
        true
    }

    fn accepts(&self, event: &RealtimeEvent) -> bool {
        if event.pipeline_id() != self.catalog.pipeline_id {
            debug!(
                "Ignoring event for pipeline '{}' while observing '{}'",
                event.pipeline_id(),
                self.catalog.pipeline_id
            );
            return false;
        }

        if let RealtimeEvent::StatusUpdate(update) = event {
            if !self.catalog.contains(&update.step_id) {
                warn!(
                    "Protocol warning: status update for unknown step '{}' of pipeline '{}'",
                    update.step_id, update.pipeline_id
                );
                return false;
            }
        }

        true
    }

    async fn report(&self, status: ChannelStatus) -> bool {
        self.events
            .send(ControllerEvent::Channel(status))
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSource, pipeline_reset, status_update};
    use chrono::{TimeZone, Utc};
    use pipewatch_client::ClientError;
    use pipewatch_core::domain::{StepDefinition, StepState};
    use std::time::Duration;

    fn catalog() -> Arc<StepCatalog> {
        Arc::new(
            StepCatalog::new(
                "p1",
                vec![StepDefinition::new("A", "Alpha"), StepDefinition::new("B", "Bravo")],
            )
            .unwrap(),
        )
    }

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts,
            delay: Duration::from_secs(5),
        }
    }

    async fn drain(rx: &mut mpsc::Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_filters_foreign_and_unknown_events() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let source = ScriptedSource::new();
        source.deliver(vec![
            Ok(status_update("other", "A", StepState::Running, ts)),
            Ok(status_update("p1", "Z", StepState::Running, ts)),
            Err(ClientError::ParseError("bad line".to_string())),
            Ok(status_update("p1", "A", StepState::Running, ts)),
            Ok(pipeline_reset("p1")),
        ]);

        let (tx, mut rx) = mpsc::channel(16);
        let handle = RealtimeStatusChannel::new(source, catalog(), policy(1), tx).spawn();

        let events = drain(&mut rx).await;
        assert!(handle.is_finished());

        let realtime: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ControllerEvent::Realtime(event) => Some(event.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            realtime,
            vec![
                status_update("p1", "A", StepState::Running, ts),
                pipeline_reset("p1")
            ]
        );
        assert!(matches!(
            events.first(),
            Some(ControllerEvent::Channel(ChannelStatus::Connected))
        ));
        assert!(matches!(
            events.last(),
            Some(ControllerEvent::Channel(ChannelStatus::GaveUp))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_bounded_attempts() {
        let source = ScriptedSource::new();
        let (tx, mut rx) = mpsc::channel(16);
        let _handle =
            RealtimeStatusChannel::new(source.clone(), catalog(), policy(3), tx).spawn();

        let events = drain(&mut rx).await;
        assert_eq!(source.subscribes(), 3);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            ControllerEvent::Channel(ChannelStatus::GaveUp)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_connection_resets_attempts() {
        let source = ScriptedSource::new();
        source.refuse();
        source.refuse();
        source.deliver(vec![]);
        // Three more refusals: the budget of 3 starts over after the connection
        source.refuse();
        source.refuse();

        let (tx, mut rx) = mpsc::channel(16);
        let _handle =
            RealtimeStatusChannel::new(source.clone(), catalog(), policy(3), tx).spawn();

        let events = drain(&mut rx).await;
        assert_eq!(source.subscribes(), 6);
        let statuses: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ControllerEvent::Channel(status) => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ChannelStatus::Connected,
                ChannelStatus::Disconnected,
                ChannelStatus::GaveUp
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_triggers_reconnect() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let source = ScriptedSource::new();
        source.deliver(vec![
            Ok(status_update("p1", "A", StepState::Running, ts)),
            Err(ClientError::api_error(502, "stream reset")),
            Ok(status_update("p1", "B", StepState::Running, ts)),
        ]);
        source.deliver_and_hold(vec![Ok(status_update(
            "p1",
            "A",
            StepState::Complete,
            ts,
        ))]);

        let (tx, mut rx) = mpsc::channel(16);
        let handle = RealtimeStatusChannel::new(source.clone(), catalog(), policy(3), tx).spawn();

        let mut seen = Vec::new();
        while seen.len() < 5 {
            seen.push(rx.recv().await.unwrap());
        }

        assert!(matches!(seen[0], ControllerEvent::Channel(ChannelStatus::Connected)));
        assert!(matches!(seen[1], ControllerEvent::Realtime(_)));
        assert!(matches!(seen[2], ControllerEvent::Channel(ChannelStatus::Disconnected)));
        assert!(matches!(seen[3], ControllerEvent::Channel(ChannelStatus::Connected)));
        assert!(matches!(
            &seen[4],
            ControllerEvent::Realtime(RealtimeEvent::StatusUpdate(u)) if u.status == StepState::Complete
        ));
        assert_eq!(source.subscribes(), 2);

        drop(handle);
        assert!(rx.recv().await.is_none());
    }
}
