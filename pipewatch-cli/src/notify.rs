//! Terminal notifications

use colored::*;
use pipewatch_monitor::{Notification, NotificationLevel, Notifier};

/// Prints notifications to the terminal
///
/// Blocking notifications are framed so they stand out until the operator
/// acts on them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        println!("{}", format_notification(&notification));
    }
}

fn format_notification(notification: &Notification) -> String {
    let label = match notification.level {
        NotificationLevel::Info => "info".cyan(),
        NotificationLevel::Success => "done".green(),
        NotificationLevel::Warning => "warn".yellow(),
        NotificationLevel::Error => "error".red(),
    };

    if notification.is_blocking() {
        format!(
            "{} {} {}",
            "!!".red().bold(),
            label.bold(),
            notification.message.bold()
        )
    } else {
        format!("[{}] {}", label, notification.message)
    }
}
