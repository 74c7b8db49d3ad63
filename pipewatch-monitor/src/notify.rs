//! User-visible notifications
//!
//! Backend failures and recoveries are reported as notifications rather than
//! errors. Transient notifications carry a display duration; blocking ones
//! stay until the user acts.

use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    /// `None` for notifications that require user action
    pub display_for: Option<Duration>,
}

impl Notification {
    /// Auto-dismissing notification
    pub fn transient(
        level: NotificationLevel,
        message: impl Into<String>,
        display_for: Duration,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            display_for: Some(display_for),
        }
    }

    /// Notification that stays until the user intervenes
    pub fn blocking(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            display_for: None,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.display_for.is_none()
    }
}

/// Sink for notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes notifications to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let blocking = notification.is_blocking();
        match notification.level {
            NotificationLevel::Info | NotificationLevel::Success => {
                info!(blocking, "{}", notification.message)
            }
            NotificationLevel::Warning => warn!(blocking, "{}", notification.message),
            NotificationLevel::Error => error!(blocking, "{}", notification.message),
        }
    }
}
