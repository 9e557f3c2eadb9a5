//! Native OS notification support for update events.
//!
//! Every notification is logged. On macOS it is also shown as a
//! Notification Center banner through `osascript`, which works from a
//! background process without a bundle identifier.

use crate::traits::{Notification, Notifier};

/// Title shown on notification banners.
const NOTIFICATION_TITLE: &str = "autopatch";

/// Notifier backed by the OS notification center.
#[derive(Debug, Clone, Default)]
pub struct OsNotifier {
    /// Only log, never show a banner.
    log_only: bool,
}

impl OsNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that writes notifications to the log only.
    pub fn log_only() -> Self {
        Self { log_only: true }
    }
}

impl Notifier for OsNotifier {
    /// Dispatches on a blocking task so delivery never stalls the cycle.
    /// Errors are logged and discarded.
    fn notify(&self, notification: Notification) {
        if notification.is_urgent() {
            tracing::error!(target: "autopatch::notify", "{}", notification.message);
        } else {
            tracing::info!(target: "autopatch::notify", "{}", notification.message);
        }

        if self.log_only {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No runtime, skipping OS notification");
            return;
        };

        let urgent = notification.is_urgent();
        handle.spawn_blocking(move || {
            send_notification(NOTIFICATION_TITLE, &notification.message, urgent);
        });
    }
}

#[cfg(target_os = "macos")]
fn send_notification(title: &str, body: &str, urgent: bool) {
    use std::process::Command;

    // Escape double quotes and backslashes for AppleScript string literals
    let escaped_title = title.replace('\\', "\\\\").replace('"', "\\\"");
    let escaped_body = body.replace('\\', "\\\\").replace('"', "\\\"");
    let sound = if urgent { "Basso" } else { "Glass" };

    let script = format!(
        "display notification \"{}\" with title \"{}\" sound name \"{}\"",
        escaped_body, escaped_title, sound
    );

    match Command::new("osascript").arg("-e").arg(&script).output() {
        Ok(output) if !output.status.success() => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("osascript notification failed: {}", stderr.trim());
        }
        Err(e) => {
            tracing::warn!("Failed to spawn osascript: {}", e);
        }
        _ => {
            tracing::debug!("OS notification sent successfully");
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn send_notification(_title: &str, _body: &str, _urgent: bool) {
    // Log output is the only channel elsewhere
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_runtime_does_not_panic() {
        OsNotifier::new().notify(Notification::normal("Installed v1.2.0"));
        OsNotifier::log_only().notify(Notification::urgent("Rollback failed"));
    }

    #[tokio::test]
    async fn test_notify_inside_runtime() {
        OsNotifier::log_only().notify(Notification::normal("Downloading v1.2.0"));
    }
}
