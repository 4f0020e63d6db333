use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use vaidya_core::{features, Document, FileType, SearchHit};
use vaidya_gateway::GatewayError;

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::state::AppState;

fn file_type_for(filename: &str, content_type: Option<&str>) -> Option<FileType> {
    if let Some(content_type) = content_type {
        if content_type == "application/pdf" {
            return Some(FileType::Pdf);
        }
        if content_type.starts_with("image/") {
            return Some(FileType::Image);
        }
    }
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        Some(FileType::Pdf)
    } else if [".png", ".jpg", ".jpeg", ".webp"]
        .iter()
        .any(|ext| lower.ends_with(ext))
    {
        Some(FileType::Image)
    } else {
        None
    }
}

/// Upload a PDF or image (multipart field `file`). The document is returned
/// in `pending` state; ingestion runs in the background.
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Document>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .unwrap_or("upload")
            .to_owned();
        let content_type = field.content_type().map(str::to_owned);
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;

        let file_type = file_type_for(&filename, content_type.as_deref()).ok_or_else(|| {
            ServerError::Gateway(GatewayError::InvalidInput(
                "only PDF and image uploads are supported".to_owned(),
            ))
        })?;

        // Uploads count against the matching feature cap: PDF uploads or
        // image analyses.
        let feature = match file_type {
            FileType::Pdf => features::DOCUMENT_UPLOAD,
            FileType::Image => features::IMAGE,
        };
        if !state.limiter.check(&user.id, feature).await {
            return Err(ServerError::Gateway(GatewayError::QuotaExceeded {
                usage: state.limiter.remaining(&user.id).await,
            }));
        }

        let document = state
            .documents
            .upload(&user.id, &filename, file_type, data)
            .await?;
        state.limiter.increment(&user.id, 0, feature).await;
        state.documents.spawn_processing(document.id.clone());
        return Ok(Json(document));
    }

    Err(ServerError::BadRequest(
        "multipart field 'file' is required".to_owned(),
    ))
}

/// List the caller's documents.
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Document>>, ServerError> {
    Ok(Json(state.documents.list(&user.id).await?))
}

/// Delete a document, its embeddings and its blob.
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.documents.delete(&user.id, &document_id).await?;
    Ok(Json(json!({ "status": "deleted", "id": document_id })))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub document_id: Option<String>,
}

/// Semantic search across the caller's completed documents.
pub async fn search(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchHit>>, ServerError> {
    let hits = state
        .documents
        .semantic_search(
            &user.id,
            &request.query,
            request.top_k.unwrap_or(5).clamp(1, 20),
            request.document_id.as_deref(),
        )
        .await?;
    Ok(Json(hits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_detection() {
        assert_eq!(
            file_type_for("notes.pdf", Some("application/pdf")),
            Some(FileType::Pdf)
        );
        assert_eq!(
            file_type_for("scan.jpeg", Some("image/jpeg")),
            Some(FileType::Image)
        );
        // Extension fallback when the content type is generic.
        assert_eq!(
            file_type_for("xray.png", Some("application/octet-stream")),
            Some(FileType::Image)
        );
        assert_eq!(file_type_for("notes.docx", None), None);
    }
}
