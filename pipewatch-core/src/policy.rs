//! Recovery policy
//!
//! Product constants for automatic retries and stale-run detection, kept as
//! configuration rather than literals.

use chrono::TimeDelta;
use std::time::Duration;

/// Default number of automatic retries per failure episode
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

/// Default delay between a failure and its automatic retry
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default age after which a locally running run is considered stale
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// Retry and staleness policy for one pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Automatic retries allowed before manual intervention is required
    pub max_retry_attempts: u32,

    /// Delay between a failure and the automatic retry
    pub retry_interval: Duration,

    /// Age after which a `running` run is reset on load
    pub stale_after: Duration,

    /// Enable the loose substring match when attributing failures to steps
    pub legacy_step_matching: bool,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            legacy_step_matching: false,
        }
    }
}

impl RecoveryPolicy {
    /// Whether another automatic retry is allowed after `attempts` failures
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retry_attempts
    }

    pub fn stale_after_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.stale_after).unwrap_or(TimeDelta::MAX)
    }
}
