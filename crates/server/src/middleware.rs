use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;
use uuid::Uuid;

use vaidya_gateway::{FeatureGate, RouteClass};

use crate::auth::decode_token;
use crate::error::ServerError;
use crate::state::AppState;

/// Assign a request id, log the request, and stamp the id on the response.
pub async fn request_id(request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = std::time::Instant::now();

    info!(request_id = %id, %method, %path, "request started");

    let mut response = next.run(request).await;

    info!(
        request_id = %id,
        %method,
        %path,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Per-feature kill switch, applied by request path.
pub async fn feature_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    state.gate.check_path(request.uri().path()).await?;
    Ok(next.run(request).await)
}

/// Maintenance gate: classify the path and ask the controller.
///
/// Admin identity is resolved from the bearer token when present so admins
/// keep working through hard maintenance.
pub async fn maintenance_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let path = request.uri().path();
    let class = classify_path(&state, path);

    let caller_is_admin = match class {
        // Only resolved when it can change the outcome.
        RouteClass::Health | RouteClass::Admin => false,
        _ => {
            let token = request
                .headers()
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_owned);
            caller_is_admin(&state, token).await
        }
    };

    state.maintenance.check_request(class, caller_is_admin).await?;
    Ok(next.run(request).await)
}

fn classify_path(state: &AppState, path: &str) -> RouteClass {
    if path.starts_with("/api/health") {
        RouteClass::Health
    } else if path.starts_with("/api/admin") {
        RouteClass::Admin
    } else if let Some(feature) = FeatureGate::feature_for_path(path) {
        state.maintenance.classify_feature(feature)
    } else {
        RouteClass::Standard
    }
}

async fn caller_is_admin(state: &AppState, token: Option<String>) -> bool {
    let Some(token) = token else {
        return false;
    };
    let Some(user_id) = decode_token(&token, &state.config.jwt_secret) else {
        return false;
    };
    state.admin.authorize(&user_id).await.is_ok()
}
