use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use vaidya_core::{ChatSession, Message};

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Create a chat session.
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<ChatSession>, ServerError> {
    let session = state.chat.create_session(&user.id, request.title).await?;
    Ok(Json(session))
}

/// List the caller's sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<ChatSession>>, ServerError> {
    Ok(Json(state.chat.list_sessions(&user.id, 100).await?))
}

/// Send a message; the reply is generated through retrieval and routing.
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Message>, ServerError> {
    let reply = state
        .chat
        .send_message(&user.id, &session_id, &request.message)
        .await?;
    Ok(Json(reply))
}

/// List a session's messages.
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Message>>, ServerError> {
    Ok(Json(state.chat.list_messages(&user.id, &session_id).await?))
}
