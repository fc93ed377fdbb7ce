//! Stateless reconciliation of caller-supplied values

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::services::reconcile_named;

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub values: Vec<i64>,
    pub strategy: String,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub strategy: String,
    pub value: i64,
}

/// POST /api/reconcile
pub async fn reconcile(Json(req): Json<ReconcileRequest>) -> ApiResult<Json<ReconcileResponse>> {
    let value = reconcile_named(&req.values, &req.strategy)?;
    Ok(Json(ReconcileResponse {
        strategy: req.strategy.to_ascii_lowercase(),
        value,
    }))
}
