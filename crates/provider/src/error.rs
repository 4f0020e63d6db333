use std::time::Duration;

use thiserror::Error;

/// Errors returned by provider adapters.
///
/// Adapters never panic on provider behavior: timeouts, transport failures
/// and vendor error responses all come back as values of this type so the
/// router can attribute the failure to a credential and continue.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The provider did not respond within the allowed duration.
    #[error("provider request timed out after {0:?}")]
    Timeout(Duration),

    /// A network or transport-level error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The vendor returned a non-success status.
    #[error("provider API error (status {status}): {message}")]
    Api {
        /// HTTP status code from the vendor.
        status: u16,
        /// Vendor error message, extracted when the body is structured.
        message: String,
        /// Whether the vendor indicated context-length overflow.
        token_limit: bool,
    },

    /// The vendor response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The adapter was misconfigured (bad endpoint, unbuildable client).
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl CompletionError {
    /// Whether a different credential might succeed where this one failed.
    ///
    /// Vendor 4xx responses other than 408/429 are treated as credential
    /// problems (bad key, revoked key) and are retryable with the next key;
    /// parse and configuration errors are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::Api { .. } => true,
            Self::Parse(_) | Self::Configuration(_) => false,
        }
    }

    /// Whether the vendor indicated context-length overflow.
    ///
    /// Token-limit failures enable an upstream retry with trimmed context
    /// instead of failing over to the next credential.
    #[must_use]
    pub fn is_token_limit(&self) -> bool {
        matches!(self, Self::Api { token_limit: true, .. })
    }
}

/// Heuristic match for vendor context-length errors.
///
/// Matches the explicit `context_length_exceeded` code, or a message
/// containing "token" alongside one of "limit", "maximum", "context length"
/// or "too long".
#[must_use]
pub fn is_token_limit_error(code: &str, message: &str) -> bool {
    if code == "context_length_exceeded" {
        return true;
    }
    let message = message.to_ascii_lowercase();
    message.contains("token")
        && (message.contains("limit")
            || message.contains("maximum")
            || message.contains("context length")
            || message.contains("too long"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(CompletionError::Timeout(Duration::from_secs(60)).is_retryable());
        assert!(CompletionError::Network("reset".into()).is_retryable());
        assert!(CompletionError::Api {
            status: 401,
            message: "invalid key".into(),
            token_limit: false,
        }
        .is_retryable());
    }

    #[test]
    fn non_retryable_errors() {
        assert!(!CompletionError::Parse("bad json".into()).is_retryable());
        assert!(!CompletionError::Configuration("no endpoint".into()).is_retryable());
    }

    #[test]
    fn token_limit_heuristic() {
        assert!(is_token_limit_error("context_length_exceeded", ""));
        assert!(is_token_limit_error("", "maximum tokens exceeded"));
        assert!(is_token_limit_error("", "Token count over the limit"));
        assert!(is_token_limit_error("", "prompt too long: 9000 tokens"));
        assert!(!is_token_limit_error("", "invalid api key"));
        assert!(!is_token_limit_error("", "rate limit exceeded"));
    }

    #[test]
    fn token_limit_flag_on_api_error() {
        let err = CompletionError::Api {
            status: 400,
            message: "context length exceeded: too many tokens".into(),
            token_limit: true,
        };
        assert!(err.is_token_limit());
        assert!(!CompletionError::Network("x".into()).is_token_limit());
    }
}
