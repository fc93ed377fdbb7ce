//! Evaluation submission and retraction

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use medfabric_common::db::models::{ImageEvaluation, ImageSetEvaluation};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::evaluations::SetScopedEvaluation;
use crate::error::ApiResult;
use crate::services::{ImageEvaluationSubmission, ImageSetEvaluationSubmission};
use crate::AppState;

/// Identity presented with a retraction
#[derive(Debug, Deserialize)]
pub struct RetractParams {
    pub doctor_id: Uuid,
    pub session_id: String,
}

/// POST /api/evaluations/image
pub async fn submit_image(
    State(state): State<AppState>,
    Json(submission): Json<ImageEvaluationSubmission>,
) -> ApiResult<(StatusCode, Json<SetScopedEvaluation>)> {
    let recorded = state.engine.submit_image_evaluation(&submission).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// POST /api/evaluations/image-set
pub async fn submit_image_set(
    State(state): State<AppState>,
    Json(submission): Json<ImageSetEvaluationSubmission>,
) -> ApiResult<(StatusCode, Json<ImageSetEvaluation>)> {
    let evaluation = state.engine.submit_image_set_evaluation(&submission).await?;
    Ok((StatusCode::CREATED, Json(evaluation)))
}

/// DELETE /api/evaluations/image/:id?doctor_id=&session_id=
pub async fn retract_image(
    State(state): State<AppState>,
    Path(evaluation_id): Path<i64>,
    Query(params): Query<RetractParams>,
) -> ApiResult<Json<ImageEvaluation>> {
    let evaluation = state
        .engine
        .retract_image_evaluation(params.doctor_id, &params.session_id, evaluation_id)
        .await?;
    Ok(Json(evaluation))
}
