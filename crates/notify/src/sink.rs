use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::event::NotifyEvent;

/// A delivery channel for operator notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name for logging (`"email"`, `"webhook"`).
    fn name(&self) -> &'static str;

    /// Deliver one event.
    async fn deliver(&self, event: &NotifyEvent) -> Result<(), NotifyError>;
}

/// A sink that records delivered events for assertions in tests.
#[derive(Default)]
pub struct CapturingSink {
    events: Mutex<Vec<NotifyEvent>>,
}

impl CapturingSink {
    /// Create a new empty capturing sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events delivered so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events of one kind, in order.
    #[must_use]
    pub fn events_of_kind(&self, kind: &str) -> Vec<NotifyEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for CapturingSink {
    fn name(&self) -> &'static str {
        "capturing"
    }

    async fn deliver(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// A sink that always fails, for exercising fan-out error handling.
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn deliver(&self, _event: &NotifyEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("mock sink failure".to_owned()))
    }
}
