use async_trait::async_trait;
use thiserror::Error;

use teleglogger_types::Notification;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rejected by Telegram: {0}")]
    Rejected(String),
}

/// Destination for notifications.
///
/// Delivery is best-effort: callers log a failed send and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier used when delivery is disabled; only logs what would be sent
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::debug!(message = %notification, "delivery disabled, not sending");
        Ok(())
    }
}
