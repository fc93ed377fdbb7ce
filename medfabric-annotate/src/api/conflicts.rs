//! Conflict scan trigger and per-set conflict queries

use axum::{
    extract::{Path, Query, State},
    Json,
};
use medfabric_common::db::models::{Conflict, Region};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::{ReconcileStrategy, ScanReport};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ConflictedResponse {
    pub image_set_id: String,
    pub conflicted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConsensusParams {
    pub region: String,
    pub strategy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsensusResponse {
    pub image_set_id: String,
    pub region: Region,
    pub strategy: ReconcileStrategy,
    /// `None` when no reviewer tagged the region in this set
    pub slice_index: Option<i64>,
}

/// POST /api/conflicts/scan
pub async fn run_scan(State(state): State<AppState>) -> ApiResult<Json<ScanReport>> {
    let report = state.engine.run_conflict_scan().await?;
    Ok(Json(report))
}

/// GET /api/image-sets/:id/conflicts
pub async fn unresolved_conflicts(
    State(state): State<AppState>,
    Path(image_set_id): Path<String>,
) -> ApiResult<Json<Vec<Conflict>>> {
    let conflicts = state.engine.unresolved_conflicts(&image_set_id).await?;
    Ok(Json(conflicts))
}

/// GET /api/image-sets/:id/conflicted
pub async fn conflicted_flag(
    State(state): State<AppState>,
    Path(image_set_id): Path<String>,
) -> ApiResult<Json<ConflictedResponse>> {
    let conflicted = state.engine.is_conflicted(&image_set_id).await?;
    Ok(Json(ConflictedResponse {
        image_set_id,
        conflicted,
    }))
}

/// GET /api/image-sets/:id/consensus?region=&strategy=
///
/// Strategy defaults to `median`.
pub async fn consensus(
    State(state): State<AppState>,
    Path(image_set_id): Path<String>,
    Query(params): Query<ConsensusParams>,
) -> ApiResult<Json<ConsensusResponse>> {
    let region = params
        .region
        .parse::<Region>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let strategy = match params.strategy.as_deref() {
        Some(name) => name.parse::<ReconcileStrategy>()?,
        None => ReconcileStrategy::Median,
    };

    let slice_index = state
        .engine
        .consensus_slice(&image_set_id, region, strategy)
        .await?;

    Ok(Json(ConsensusResponse {
        image_set_id,
        region,
        strategy,
        slice_index,
    }))
}
