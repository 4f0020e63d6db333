use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use vaidya_core::UsageSnapshot;

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::state::AppState;

/// Today's usage counters for the caller.
pub async fn usage(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UsageSnapshot>, ServerError> {
    Ok(Json(state.limiter.remaining(&user.id).await))
}

#[derive(Debug, Deserialize)]
pub struct SetPersonalKeyRequest {
    pub api_key: String,
}

/// Set the caller's personal override key.
pub async fn set_personal_key(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SetPersonalKeyRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state
        .accounts
        .set_personal_key(&user.id, &request.api_key)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Remove the caller's personal override key.
pub async fn clear_personal_key(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.accounts.clear_personal_key(&user.id).await?;
    Ok(Json(json!({ "status": "ok" })))
}
