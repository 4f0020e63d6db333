use axum::Json;
use serde_json::json;

/// Liveness endpoint. Always served, regardless of gates.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "vaidya",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
