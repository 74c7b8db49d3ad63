//! Monitor configuration
//!
//! All intervals are configurable so the same monitor can run against a
//! local backend with short timers and a production backend with the real
//! product constants.

use pipewatch_core::RecoveryPolicy;
use std::time::Duration;

use crate::error::MonitorError;

/// Upper bound for every configured interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Reconnect behaviour of the realtime channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed connection attempts before giving up
    pub max_attempts: u32,

    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Pipeline being observed
    pub pipeline_id: String,

    /// Retry and staleness policy
    pub recovery: RecoveryPolicy,

    /// How often to reconcile against the backend snapshot
    pub reconcile_interval: Duration,

    /// How long transient notifications stay visible
    pub notification_duration: Duration,

    /// Realtime channel reconnect policy
    pub reconnect: ReconnectPolicy,
}

impl MonitorConfig {
    /// Creates a configuration with default timers
    pub fn new(pipeline_id: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            recovery: RecoveryPolicy::default(),
            reconcile_interval: Duration::from_secs(60),
            notification_duration: Duration::from_secs(5),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.pipeline_id.trim().is_empty() {
            return Err(MonitorError::Config("pipeline_id cannot be empty".into()));
        }

        if self.recovery.retry_interval.is_zero() {
            return Err(MonitorError::Config(
                "retry_interval must be greater than 0".into(),
            ));
        }

        if self.recovery.stale_after.is_zero() {
            return Err(MonitorError::Config(
                "stale_after must be greater than 0".into(),
            ));
        }

        if self.reconcile_interval.is_zero() {
            return Err(MonitorError::Config(
                "reconcile_interval must be greater than 0".into(),
            ));
        }

        if self.reconnect.delay.is_zero() {
            return Err(MonitorError::Config(
                "reconnect delay must be greater than 0".into(),
            ));
        }

        for (name, value) in [
            ("retry_interval", self.recovery.retry_interval),
            ("stale_after", self.recovery.stale_after),
            ("reconcile_interval", self.reconcile_interval),
            ("reconnect delay", self.reconnect.delay),
        ] {
            if value > MAX_INTERVAL {
                return Err(MonitorError::Config(format!(
                    "{} must be at most {} days",
                    name,
                    MAX_INTERVAL.as_secs() / 86_400
                )));
            }
        }

        Ok(())
    }
}
