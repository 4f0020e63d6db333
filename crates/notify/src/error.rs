use thiserror::Error;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink was misconfigured (bad address, unbuildable transport).
    #[error("notification configuration error: {0}")]
    Configuration(String),

    /// Delivery to the downstream service failed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}
