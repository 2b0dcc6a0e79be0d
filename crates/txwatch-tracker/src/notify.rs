//! User-facing notifications.
//!
//! A notification's `key` is the transaction hash, so a UI can replace the
//! provisional pending notice with the final outcome.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Pending,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub key: String,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

/// Sink for user-facing notifications (toasts, desktop alerts, log lines).
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Error => {
                tracing::error!(tx_hash = %n.key, title = %n.title, explorer = ?n.explorer_url, "{}", n.message)
            }
            NotificationLevel::Warning => {
                tracing::warn!(tx_hash = %n.key, title = %n.title, explorer = ?n.explorer_url, "{}", n.message)
            }
            NotificationLevel::Pending | NotificationLevel::Success => {
                tracing::info!(tx_hash = %n.key, title = %n.title, level = ?n.level, explorer = ?n.explorer_url, "{}", n.message)
            }
        }
    }
}
