use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use vaidya_audit::{AuditPage, AuditQuery};
use vaidya_core::credential::HealthCheckRecord;
use vaidya_core::{Credential, MaintenanceState, User};
use vaidya_gateway::KeyTestResult;

use crate::auth::AuthUser;
use crate::error::ServerError;
use crate::state::AppState;

// The admin service authorizes every call itself (allowlist + role, or the
// break-glass email); handlers only carry the caller identity through.

#[derive(Debug, Deserialize)]
pub struct AddKeyRequest {
    pub provider: String,
    pub feature: String,
    pub key: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_owned()
}

pub async fn add_api_key(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<AddKeyRequest>,
) -> Result<Json<Credential>, ServerError> {
    let credential = state
        .admin
        .add_api_key(
            &caller.id,
            &request.provider,
            &request.feature,
            &request.key,
            request.priority,
            &request.status,
        )
        .await?;
    Ok(Json(credential))
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<Vec<Credential>>, ServerError> {
    Ok(Json(state.admin.list_api_keys(&caller.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateKeyRequest {
    pub status: String,
    pub priority: Option<i32>,
}

pub async fn update_api_key(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(key_id): Path<String>,
    Json(request): Json<UpdateKeyRequest>,
) -> Result<Json<Credential>, ServerError> {
    let credential = state
        .admin
        .update_key_status(&caller.id, &key_id, &request.status, request.priority)
        .await?;
    Ok(Json(credential))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(key_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.admin.delete_api_key(&caller.id, &key_id).await?;
    Ok(Json(json!({ "status": "deleted", "id": key_id })))
}

#[derive(Debug, Deserialize)]
pub struct TestKeyRequest {
    pub key: String,
    pub provider: String,
}

pub async fn test_api_key(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<TestKeyRequest>,
) -> Result<Json<KeyTestResult>, ServerError> {
    let result = state
        .admin
        .test_api_key(&caller.id, &request.key, &request.provider)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<User>>, ServerError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    Ok(Json(state.admin.list_users(&caller.id, limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub plan: String,
}

pub async fn update_user_plan(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<User>, ServerError> {
    let user = state
        .admin
        .update_user_plan(&caller.id, &user_id, &request.plan)
        .await?;
    Ok(Json(user))
}

pub async fn disable_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.admin.set_user_disabled(&caller.id, &user_id, true).await?;
    Ok(Json(json!({ "status": "disabled", "id": user_id })))
}

pub async fn enable_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state
        .admin
        .set_user_disabled(&caller.id, &user_id, false)
        .await?;
    Ok(Json(json!({ "status": "enabled", "id": user_id })))
}

#[derive(Debug, Deserialize)]
pub struct ResetUsageRequest {
    /// Date to reset; today when absent.
    pub date: Option<NaiveDate>,
}

pub async fn reset_user_usage(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<String>,
    Json(request): Json<ResetUsageRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let date = request
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    state
        .admin
        .reset_user_usage(&caller.id, &user_id, date)
        .await?;
    Ok(Json(json!({ "status": "reset", "id": user_id, "date": date })))
}

#[derive(Debug, Deserialize)]
pub struct ToggleFeatureRequest {
    pub enabled: bool,
}

pub async fn toggle_feature(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(feature): Path<String>,
    Json(request): Json<ToggleFeatureRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state
        .admin
        .toggle_feature(&caller.id, &feature, request.enabled)
        .await?;
    Ok(Json(json!({ "feature": feature, "enabled": request.enabled })))
}

pub async fn feature_states(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<serde_json::Value>, ServerError> {
    let states = state.admin.feature_states(&caller.id).await?;
    let map: serde_json::Map<String, serde_json::Value> = states
        .into_iter()
        .map(|(feature, enabled)| (feature, json!(enabled)))
        .collect();
    Ok(Json(serde_json::Value::Object(map)))
}

#[derive(Debug, Deserialize)]
pub struct EnterMaintenanceRequest {
    pub level: String,
    pub reason: String,
    pub feature: Option<String>,
}

pub async fn enter_maintenance(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(request): Json<EnterMaintenanceRequest>,
) -> Result<Json<MaintenanceState>, ServerError> {
    let entered = state
        .admin
        .enter_maintenance(&caller.id, &request.level, &request.reason, request.feature)
        .await?;
    Ok(Json(entered))
}

pub async fn exit_maintenance(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<serde_json::Value>, ServerError> {
    let previous = state.admin.exit_maintenance(&caller.id).await?;
    Ok(Json(json!({ "is_active": false, "previous": previous })))
}

pub async fn maintenance_status(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> Result<Json<serde_json::Value>, ServerError> {
    let current = state.admin.maintenance_status(&caller.id).await?;
    Ok(Json(json!({
        "is_active": current.is_some(),
        "state": current,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub admin_id: Option<String>,
    pub action_type: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn audit_log(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditPage>, ServerError> {
    let page = state
        .admin
        .audit_log(
            &caller.id,
            &AuditQuery {
                admin_id: query.admin_id,
                action_type: query.action_type,
                target_type: query.target_type,
                target_id: query.target_id,
                from: None,
                to: None,
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;
    Ok(Json(page))
}

pub async fn health_records(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<HealthCheckRecord>>, ServerError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    Ok(Json(state.admin.health_records(&caller.id, limit).await?))
}
