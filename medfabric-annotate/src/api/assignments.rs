//! Next-batch assignment

use axum::{extract::State, Json};
use medfabric_common::config::AssignmentPolicy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::services::Assignment;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub doctor_id: Uuid,
    pub count: Option<usize>,
    /// `least_chosen` (or `leastChosen`) or `random`
    pub policy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub doctor_id: Uuid,
    pub assignments: Vec<Assignment>,
}

/// POST /api/assignments
pub async fn next_assignment(
    State(state): State<AppState>,
    Json(req): Json<AssignmentRequest>,
) -> ApiResult<Json<AssignmentResponse>> {
    let policy = req
        .policy
        .as_deref()
        .map(str::parse::<AssignmentPolicy>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let assignments = state
        .engine
        .next_assignment(req.doctor_id, req.count, policy)
        .await?;

    Ok(Json(AssignmentResponse {
        doctor_id: req.doctor_id,
        assignments,
    }))
}
