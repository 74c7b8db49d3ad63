//! Retry scheduler
//!
//! Holds at most one pending automatic retry. The timer task only posts a
//! [`ControllerEvent::RetryDue`] back to the controller queue; starting the
//! run happens in the controller's own turn. Each schedule carries a token
//! so a timer that fired just before being cancelled is recognised as stale.

use chrono::{DateTime, TimeDelta, Utc};
use pipewatch_core::RecoveryPolicy;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::controller::ControllerEvent;

/// What to do after a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry once after `delay`
    Schedule { delay: Duration },
    /// Budget used up; manual intervention required
    Exhausted,
}

impl RetryDecision {
    /// Decision after the run has failed `attempts` times in this episode
    pub fn decide(policy: &RecoveryPolicy, attempts: u32) -> Self {
        if policy.allows_retry(attempts) {
            RetryDecision::Schedule {
                delay: policy.retry_interval,
            }
        } else {
            RetryDecision::Exhausted
        }
    }
}

struct PendingRetry {
    task: JoinHandle<()>,
    due_at: DateTime<Utc>,
    token: u64,
}

/// Owner of the automatic retry timer
pub struct RetryScheduler {
    events: mpsc::Sender<ControllerEvent>,
    pending: Option<PendingRetry>,
    next_token: u64,
}

impl RetryScheduler {
    pub fn new(events: mpsc::Sender<ControllerEvent>) -> Self {
        Self {
            events,
            pending: None,
            next_token: 0,
        }
    }

    /// Schedules a retry after `delay`, replacing any pending one
    ///
    /// Returns the wall-clock time the retry is due.
    pub fn schedule(&mut self, delay: Duration) -> DateTime<Utc> {
        self.cancel();

        self.next_token += 1;
        let token = self.next_token;
        let due_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the controller shut down
            let _ = events.send(ControllerEvent::RetryDue { token }).await;
        });

        debug!("Retry {} scheduled for {}", token, due_at);
        self.pending = Some(PendingRetry {
            task,
            due_at,
            token,
        });
        due_at
    }

    /// Cancels the pending retry. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => {
                pending.task.abort();
                debug!("Retry {} cancelled", pending.token);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.pending.as_ref().map(|p| p.due_at)
    }

    /// Claims a fired retry
    ///
    /// Returns false for tokens of retries that were cancelled or replaced
    /// after their timer fired.
    pub fn take_fired(&mut self, token: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
