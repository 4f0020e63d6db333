use thiserror::Error;

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A serialization or column-decoding error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend itself failed (connection, query, I/O).
    #[error("storage backend error: {0}")]
    Backend(String),
}
