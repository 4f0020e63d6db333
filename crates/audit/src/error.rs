use thiserror::Error;

/// Errors that can occur during audit storage operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backend failed to persist or read records.
    #[error("audit backend error: {0}")]
    Backend(String),

    /// A record failed to serialize or deserialize.
    #[error("audit serialization error: {0}")]
    Serialization(String),
}
