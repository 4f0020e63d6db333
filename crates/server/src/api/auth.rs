use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vaidya_core::{Plan, User};
use vaidya_gateway::GatewayError;

use crate::auth::{hash_password, issue_token, verify_password};
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionPayload {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub session: SessionPayload,
    pub plan: Plan,
}

/// Create a user on the free plan and issue a session.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let email = request.email.trim().to_ascii_lowercase();
    if !email.contains('@') {
        return Err(ServerError::Gateway(GatewayError::InvalidInput(
            "invalid email address".to_owned(),
        )));
    }
    if request.password.len() < 8 {
        return Err(ServerError::Gateway(GatewayError::InvalidInput(
            "password must be at least 8 characters".to_owned(),
        )));
    }
    if request.name.trim().is_empty() {
        return Err(ServerError::Gateway(GatewayError::InvalidInput(
            "name is required".to_owned(),
        )));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        display_name: request.name.trim().to_owned(),
        plan: Plan::Free,
        role: None,
        disabled: false,
        personal_api_key: None,
        password_hash: hash_password(&request.password)?,
        created_at: now,
        updated_at: now,
    };
    state
        .users
        .insert_user(user.clone())
        .await
        .map_err(GatewayError::from)?;

    let token = issue_token(&user, &state.config.jwt_secret, state.config.session_ttl)?;
    Ok(Json(AuthResponse {
        plan: user.plan,
        session: SessionPayload {
            access_token: token,
        },
        user,
    }))
}

/// Authenticate with email and password, issuing a session.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServerError> {
    let user = state
        .users
        .get_user_by_email(request.email.trim())
        .await
        .map_err(GatewayError::from)?
        .ok_or_else(|| {
            ServerError::Gateway(GatewayError::Unauthorized(
                "invalid email or password".to_owned(),
            ))
        })?;

    if !verify_password(&user.password_hash, &request.password) {
        return Err(ServerError::Gateway(GatewayError::Unauthorized(
            "invalid email or password".to_owned(),
        )));
    }
    if user.disabled {
        return Err(ServerError::Gateway(GatewayError::AccountDisabled));
    }

    let token = issue_token(&user, &state.config.jwt_secret, state.config.session_ttl)?;
    Ok(Json(AuthResponse {
        plan: user.plan,
        session: SessionPayload {
            access_token: token,
        },
        user,
    }))
}
