//! Evaluation store
//!
//! Write path for per-slice and per-set evaluations. Each function runs the
//! full authorize → existence → duplicate check → validate → insert sequence
//! on one connection; the caller owns the transaction and the write gate.
//! A UNIQUE violation that slips past the duplicate check is reported as
//! `EvaluationError::AlreadyExists`, never as a storage error.

use medfabric_common::db::models::{ImageEvaluation, ImageSetEvaluation, Region, ScoreSet};
use medfabric_common::{
    AuthError, Error, EvaluationError, ImageError, ImageSetError, Result,
};
use serde::Deserialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::evaluations::{self, SetScopedEvaluation};
use crate::db::{image_sets, images};
use crate::services::session_gate;
use crate::services::validator::ScoreValidator;

#[derive(Debug, Clone, Deserialize)]
pub struct ImageEvaluationSubmission {
    pub doctor_id: Uuid,
    pub image_id: String,
    pub session_id: String,
    pub region: Region,
    #[serde(default)]
    pub scores: ScoreSet,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSetEvaluationSubmission {
    pub doctor_id: Uuid,
    pub image_set_id: String,
    pub session_id: String,
    #[serde(default)]
    pub is_low_quality: bool,
    #[serde(default)]
    pub is_irrelevant: bool,
}

fn duplicate(what: String) -> Error {
    EvaluationError::AlreadyExists(what).into()
}

fn map_unique_violation(err: Error, what: impl FnOnce() -> String) -> Error {
    if err.is_unique_violation() {
        tracing::warn!("Concurrent duplicate evaluation caught by storage constraint");
        duplicate(what())
    } else {
        err
    }
}

pub async fn submit_image_evaluation(
    conn: &mut SqliteConnection,
    validator: &ScoreValidator,
    submission: &ImageEvaluationSubmission,
) -> Result<SetScopedEvaluation> {
    let session =
        session_gate::authorize(conn, submission.doctor_id, &submission.session_id).await?;

    let Some(image) = images::find_image(conn, &submission.image_id).await? else {
        return Err(ImageError::NotFound(submission.image_id.clone()).into());
    };

    if evaluations::set_evaluation_exists(
        conn,
        submission.doctor_id,
        &image.image_set_id,
        session.session_id,
    )
    .await?
    {
        return Err(duplicate(format!(
            "image set {} was already judged as a whole in session {}",
            image.image_set_id, session.session_id
        )));
    }

    if evaluations::image_evaluation_exists(
        conn,
        submission.doctor_id,
        &image.image_id,
        session.session_id,
    )
    .await?
    {
        return Err(duplicate(format!(
            "image {} in session {}",
            image.image_id, session.session_id
        )));
    }

    validator.validate(submission.region, &submission.scores)?;

    let evaluation = evaluations::insert_image_evaluation(
        conn,
        submission.doctor_id,
        &image.image_id,
        session.session_id,
        submission.region,
        &submission.scores,
        submission.notes.as_deref(),
    )
    .await
    .map_err(|e| map_unique_violation(e, || format!("image {}", image.image_id)))?;

    tracing::info!(
        evaluation_id = evaluation.id,
        doctor_id = %evaluation.doctor_id,
        image_id = %evaluation.image_id,
        region = %evaluation.region,
        "Image evaluation recorded"
    );

    Ok(SetScopedEvaluation {
        image_set_id: image.image_set_id,
        evaluation,
    })
}

pub async fn submit_image_set_evaluation(
    conn: &mut SqliteConnection,
    submission: &ImageSetEvaluationSubmission,
) -> Result<ImageSetEvaluation> {
    let session =
        session_gate::authorize(conn, submission.doctor_id, &submission.session_id).await?;

    if !image_sets::exists(conn, &submission.image_set_id).await? {
        return Err(ImageSetError::NotFound(submission.image_set_id.clone()).into());
    }

    if !submission.is_low_quality && !submission.is_irrelevant {
        return Err(EvaluationError::Invalid(
            "an image set verdict must mark it low quality or irrelevant".to_string(),
        )
        .into());
    }

    if evaluations::set_evaluation_exists(
        conn,
        submission.doctor_id,
        &submission.image_set_id,
        session.session_id,
    )
    .await?
    {
        return Err(duplicate(format!(
            "image set {} in session {}",
            submission.image_set_id, session.session_id
        )));
    }

    let evaluation = evaluations::insert_set_evaluation(
        conn,
        submission.doctor_id,
        &submission.image_set_id,
        session.session_id,
        submission.is_low_quality,
        submission.is_irrelevant,
    )
    .await
    .map_err(|e| map_unique_violation(e, || format!("image set {}", submission.image_set_id)))?;

    tracing::info!(
        evaluation_id = evaluation.id,
        doctor_id = %evaluation.doctor_id,
        image_set_id = %evaluation.image_set_id,
        is_low_quality = evaluation.is_low_quality,
        is_irrelevant = evaluation.is_irrelevant,
        "Image set evaluation recorded"
    );

    Ok(evaluation)
}

/// Withdraw one of the reviewer's own per-slice evaluations
pub async fn retract_image_evaluation(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    session_id: &str,
    evaluation_id: i64,
) -> Result<ImageEvaluation> {
    session_gate::authorize(conn, doctor_id, session_id).await?;

    let Some(evaluation) = evaluations::find_image_evaluation(conn, evaluation_id).await? else {
        return Err(EvaluationError::NotFound(evaluation_id.to_string()).into());
    };

    if evaluation.doctor_id != doctor_id {
        return Err(AuthError::Unauthorized(format!(
            "evaluation {} belongs to another doctor",
            evaluation_id
        ))
        .into());
    }

    evaluations::delete_image_evaluation(conn, evaluation_id).await?;
    tracing::info!(evaluation_id, doctor_id = %doctor_id, "Image evaluation retracted");
    Ok(evaluation)
}
