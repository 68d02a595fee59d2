use std::sync::Arc;

use teleglogger_notify::Notifier;
use teleglogger_types::{LogLine, Notification};

use crate::filter::LineFilter;

/// Sends matching lines and lifecycle notices to the notifier
#[derive(Clone)]
pub struct Dispatcher {
    filter: LineFilter,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(filter: LineFilter, notifier: Arc<dyn Notifier>) -> Self {
        Self { filter, notifier }
    }

    /// Forward `line` if it matches. Returns whether it matched.
    pub async fn dispatch(&self, line: &LogLine) -> bool {
        if !self.filter.matches(line) {
            tracing::debug!(
                container = %line.container_id.short(),
                source = %line.source,
                text = %line.text,
                "no match"
            );
            return false;
        }

        tracing::debug!(
            container = %line.container_id.short(),
            source = %line.source,
            text = %line.text,
            "match"
        );
        self.notify(&Notification::line(line)).await;
        true
    }

    /// Best-effort delivery; failures are logged and dropped
    pub async fn notify(&self, notification: &Notification) {
        if let Err(e) = self.notifier.send(notification).await {
            tracing::debug!(error = %e, message = %notification, "notification delivery failed");
        }
    }
}
