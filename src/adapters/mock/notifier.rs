//! Recording notifier for testing.

use std::sync::{Arc, Mutex};

use crate::traits::{Notification, Notifier};

/// Notifier that keeps every notification it receives.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn urgent(&self) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(Notification::is_urgent)
            .collect()
    }

    /// Whether any message contains `text`.
    pub fn contains(&self, text: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.message.contains(text))
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_notifications() {
        let notifier = MockNotifier::new();
        notifier.notify(Notification::normal("Downloading v1.2"));
        notifier.notify(Notification::urgent("Rollback failed"));

        assert_eq!(notifier.notifications().len(), 2);
        assert_eq!(notifier.urgent().len(), 1);
        assert!(notifier.contains("v1.2"));

        notifier.clear();
        assert!(notifier.notifications().is_empty());
    }
}
