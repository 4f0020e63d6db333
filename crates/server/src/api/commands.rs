use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use vaidya_gateway::CommandOutput;

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub topic: String,
}

/// Generate a study artifact (`flashcard`, `mcq`, `highyield`, `explain`,
/// `map`) for a topic.
pub async fn generate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(command): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandOutput>, ServerError> {
    let output = state
        .commands
        .generate(&user.id, &command, &request.topic)
        .await?;
    Ok(Json(output))
}
