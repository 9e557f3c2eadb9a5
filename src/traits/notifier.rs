//! Notification channel abstraction.

/// How loudly a notification should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationPriority {
    /// Routine status update.
    Normal,
    /// Requires manual intervention.
    Urgent,
}

/// A short human-readable status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub priority: NotificationPriority,
}

impl Notification {
    /// A routine status message.
    pub fn normal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            priority: NotificationPriority::Normal,
        }
    }

    /// A message that needs a human.
    pub fn urgent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            priority: NotificationPriority::Urgent,
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == NotificationPriority::Urgent
    }
}

/// Delivers status notifications.
///
/// Delivery is fire-and-forget: a notifier must never block or fail the
/// update cycle.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
