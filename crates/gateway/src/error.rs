use thiserror::Error;

use vaidya_core::{MaintenanceLevel, UsageSnapshot};
use vaidya_store::{BlobError, StoreError};

/// Errors surfaced by the gateway services.
///
/// The user-error variants map one-to-one onto the API error envelope codes;
/// everything else is an internal error to the caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request payload was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced entity does not exist or is not visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is not authenticated.
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// The caller lacks authority for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The account is disabled; only re-enabling is permitted.
    #[error("account is disabled")]
    AccountDisabled,

    /// The caller exhausted a daily quota.
    #[error("daily quota exceeded")]
    QuotaExceeded {
        /// Today's counters, for client display.
        usage: UsageSnapshot,
    },

    /// The feature is switched off by an operator.
    #[error("feature disabled: {feature}")]
    FeatureDisabled {
        /// The disabled feature tag.
        feature: String,
    },

    /// The system is in maintenance and the route is gated.
    #[error("maintenance mode ({level}): {reason}")]
    Maintenance {
        level: MaintenanceLevel,
        reason: String,
    },

    /// Every candidate credential failed or none were available.
    #[error("routing failed after {attempts} attempts: {message}")]
    RoutingFailed {
        message: String,
        attempts: u32,
        /// Whether the final failure was a context-length overflow.
        token_limit: bool,
    },

    /// Document ingestion failed.
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    /// A credential ciphertext could not be processed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// The storage backend failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The blob backend failed.
    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl From<vaidya_crypto::CryptoError> for GatewayError {
    fn from(e: vaidya_crypto::CryptoError) -> Self {
        Self::Crypto(e.to_string())
    }
}
