use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use vaidya_gateway::GatewayError;

/// Errors surfaced by the server process and API handlers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A gateway-level error surfaced through the API.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Request payload could not be read.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ServerError {
    /// The envelope code, HTTP status and extra context for this error.
    fn envelope(&self) -> (StatusCode, &'static str, String, serde_json::Value) {
        match self {
            Self::Gateway(e) => Self::gateway_envelope(e),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                message.clone(),
                json!({}),
            ),
            Self::Config(_) | Self::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "An unexpected error occurred. Please try again later.".to_owned(),
                json!({}),
            ),
        }
    }

    fn gateway_envelope(
        error: &GatewayError,
    ) -> (StatusCode, &'static str, String, serde_json::Value) {
        match error {
            GatewayError::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                message.clone(),
                json!({}),
            ),
            GatewayError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("not found: {what}"),
                json!({}),
            ),
            GatewayError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_FAILED",
                message.clone(),
                json!({}),
            ),
            GatewayError::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                message.clone(),
                json!({}),
            ),
            GatewayError::AccountDisabled => (
                StatusCode::FORBIDDEN,
                "ACCOUNT_DISABLED",
                "This account is disabled.".to_owned(),
                json!({}),
            ),
            GatewayError::QuotaExceeded { usage } => (
                StatusCode::TOO_MANY_REQUESTS,
                "QUOTA_EXCEEDED",
                "Daily quota exceeded for your plan.".to_owned(),
                json!({ "usage": usage }),
            ),
            GatewayError::FeatureDisabled { feature } => (
                StatusCode::FORBIDDEN,
                "FEATURE_DISABLED",
                format!("The '{feature}' feature is currently disabled."),
                json!({ "feature": feature }),
            ),
            GatewayError::Maintenance { level, reason } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "MAINTENANCE_MODE",
                format!("The system is in {level} maintenance: {reason}"),
                json!({ "level": level, "reason": reason }),
            ),
            GatewayError::RoutingFailed {
                message, attempts, ..
            } => (
                StatusCode::BAD_GATEWAY,
                "ROUTING_FAILED",
                format!("All providers failed: {message}"),
                json!({ "attempts": attempts }),
            ),
            GatewayError::Ingestion(_)
            | GatewayError::Crypto(_)
            | GatewayError::Store(_)
            | GatewayError::Blob(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "An unexpected error occurred. Please try again later.".to_owned(),
                json!({}),
            ),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message, context) = self.envelope();

        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }

        let mut error = json!({ "code": code, "message": message });
        if let (Some(error_obj), Some(context_obj)) =
            (error.as_object_mut(), context.as_object())
        {
            for (key, value) in context_obj {
                error_obj.insert(key.clone(), value.clone());
            }
        }

        (status, axum::Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use vaidya_core::MaintenanceLevel;

    use super::*;

    #[test]
    fn feature_disabled_maps_to_403_with_feature() {
        let err = ServerError::Gateway(GatewayError::FeatureDisabled {
            feature: "mcq".into(),
        });
        let (status, code, _, context) = err.envelope();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "FEATURE_DISABLED");
        assert_eq!(context["feature"], "mcq");
    }

    #[test]
    fn maintenance_maps_to_503() {
        let err = ServerError::Gateway(GatewayError::Maintenance {
            level: MaintenanceLevel::Hard,
            reason: "total key failure".into(),
        });
        let (status, code, _, context) = err.envelope();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "MAINTENANCE_MODE");
        assert_eq!(context["level"], "hard");
    }

    #[test]
    fn quota_maps_to_429_with_usage() {
        let err = ServerError::Gateway(GatewayError::QuotaExceeded {
            usage: vaidya_core::UsageSnapshot::default(),
        });
        let (status, code, _, context) = err.envelope();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(code, "QUOTA_EXCEEDED");
        assert!(context["usage"].is_object());
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = ServerError::Gateway(GatewayError::Crypto("wrong key length".into()));
        let (status, code, message, _) = err.envelope();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_SERVER_ERROR");
        assert!(!message.contains("key length"));
    }
}
