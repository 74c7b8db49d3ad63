//! Pipewatch Monitor
//!
//! Keeps the locally persisted view of a pipeline run consistent with the
//! backend.
//!
//! Architecture:
//! - Tracker: applies model transitions and persists them in the same turn
//! - Reconciler: corrects drift from the backend's authoritative snapshot
//! - Retry scheduler: bounded automatic retries after a failed run
//! - Realtime channel: reconnecting event stream feeding the controller
//! - Controller: single-owner event loop tying the pieces together
//!
//! Every resource with a background task (the channel and the retry timer)
//! is owned by the controller and aborted when dropped.

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod reconcile;
pub mod retry;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use channel::{ChannelHandle, RealtimeStatusChannel};
pub use config::{MonitorConfig, ReconnectPolicy};
pub use controller::{ChannelStatus, ControllerEvent, PipelineController, StatusView, UserCommand};
pub use error::MonitorError;
pub use notify::{Notification, NotificationLevel, Notifier, TracingNotifier};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use retry::{RetryDecision, RetryScheduler};
pub use tracker::RunTracker;
