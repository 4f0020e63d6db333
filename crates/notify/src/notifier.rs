use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::NotifyEvent;
use crate::sink::NotificationSink;

/// Fans one event out to every configured sink.
///
/// Sink failures are logged and swallowed: a dead SMTP relay must never
/// cancel the health event or admin action that fired the notification.
#[derive(Clone, Default)]
pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    /// A notifier with the given sinks.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    /// A notifier with no sinks; every publish is a no-op.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether any sink is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.sinks.is_empty()
    }

    /// Deliver the event to every sink, logging failures.
    pub async fn publish(&self, event: &NotifyEvent) {
        if self.sinks.is_empty() {
            debug!(kind = event.kind(), "no notification sinks configured");
            return;
        }
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(event).await {
                warn!(
                    sink = sink.name(),
                    kind = event.kind(),
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::sink::{CapturingSink, FailingSink};

    use super::*;

    fn event() -> NotifyEvent {
        NotifyEvent::AdminOverride {
            admin_id: "admin-1".into(),
            action: "exit_maintenance".into(),
            details: serde_json::json!({"previous_level": "soft"}),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_all_sinks() {
        let first = Arc::new(CapturingSink::new());
        let second = Arc::new(CapturingSink::new());
        let notifier = Notifier::new(vec![first.clone(), second.clone()]);

        notifier.publish(&event()).await;

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let capturing = Arc::new(CapturingSink::new());
        let notifier = Notifier::new(vec![Arc::new(FailingSink), capturing.clone()]);

        notifier.publish(&event()).await;

        assert_eq!(capturing.events().len(), 1);
    }

    #[tokio::test]
    async fn disabled_notifier_is_noop() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        notifier.publish(&event()).await;
    }
}
