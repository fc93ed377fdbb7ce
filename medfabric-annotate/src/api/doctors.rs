//! Reviewer registration, login and logout

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use medfabric_common::db::models::{Doctor, Role, SessionRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct EvaluatedSetsResponse {
    pub doctor_id: Uuid,
    pub image_set_ids: Vec<String>,
}

/// POST /api/doctors
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Doctor>)> {
    let doctor = state
        .engine
        .register_doctor(&req.username, &req.password, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(doctor)))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionRecord>> {
    let session = state.engine.login(&req.username, &req.password).await?;
    Ok(Json(session))
}

/// POST /api/logout
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> ApiResult<Json<SessionRecord>> {
    let session = state.engine.deactivate_session(&req.session_id).await?;
    Ok(Json(session))
}

/// GET /api/doctors/:id/evaluated-sets
pub async fn evaluated_sets(
    State(state): State<AppState>,
    Path(doctor_id): Path<Uuid>,
) -> ApiResult<Json<EvaluatedSetsResponse>> {
    let image_set_ids = state.engine.evaluated_sets(doctor_id).await?;
    Ok(Json(EvaluatedSetsResponse {
        doctor_id,
        image_set_ids,
    }))
}
