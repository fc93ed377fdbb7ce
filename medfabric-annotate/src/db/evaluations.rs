//! Image-level and set-level evaluation records
//!
//! The UNIQUE constraints on both tables are the last line of duplicate
//! protection; callers map a violation to `EvaluationError::AlreadyExists`.

use std::collections::HashMap;

use medfabric_common::db::models::{ImageEvaluation, ImageSetEvaluation, Region, ScoreSet};
use medfabric_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::uuid_column;

/// Image evaluation joined with the set its image belongs to
#[derive(Debug, Clone, Serialize)]
pub struct SetScopedEvaluation {
    pub image_set_id: String,
    pub evaluation: ImageEvaluation,
}

/// One reviewer session's tag of a slice with a region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTag {
    pub doctor_id: Uuid,
    pub session_id: Uuid,
    pub slice_index: i64,
}

fn image_evaluation_from_row(row: &SqliteRow) -> Result<ImageEvaluation> {
    let region: String = row.try_get("region")?;
    Ok(ImageEvaluation {
        id: row.try_get("id")?,
        doctor_id: uuid_column(row, "doctor_id")?,
        image_id: row.try_get("image_id")?,
        session_id: uuid_column(row, "session_id")?,
        region: region.parse::<Region>()?,
        scores: ScoreSet {
            basal_central_left: row.try_get("basal_score_central_left")?,
            basal_central_right: row.try_get("basal_score_central_right")?,
            basal_cortex_left: row.try_get("basal_score_cortex_left")?,
            basal_cortex_right: row.try_get("basal_score_cortex_right")?,
            corona_left: row.try_get("corona_score_left")?,
            corona_right: row.try_get("corona_score_right")?,
        },
        notes: row.try_get("notes")?,
    })
}

fn set_evaluation_from_row(row: &SqliteRow) -> Result<ImageSetEvaluation> {
    Ok(ImageSetEvaluation {
        id: row.try_get("id")?,
        doctor_id: uuid_column(row, "doctor_id")?,
        image_set_id: row.try_get("image_set_id")?,
        session_id: uuid_column(row, "session_id")?,
        is_low_quality: row.try_get("is_low_quality")?,
        is_irrelevant: row.try_get("is_irrelevant")?,
    })
}

/// Insert an image evaluation and return the stored record
pub async fn insert_image_evaluation(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    image_id: &str,
    session_id: Uuid,
    region: Region,
    scores: &ScoreSet,
    notes: Option<&str>,
) -> Result<ImageEvaluation> {
    let result = sqlx::query(
        r#"
        INSERT INTO image_evaluations (
            doctor_id, image_id, session_id, region,
            basal_score_central_left, basal_score_central_right,
            basal_score_cortex_left, basal_score_cortex_right,
            corona_score_left, corona_score_right,
            notes, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(doctor_id.to_string())
    .bind(image_id)
    .bind(session_id.to_string())
    .bind(region.as_str())
    .bind(scores.basal_central_left)
    .bind(scores.basal_central_right)
    .bind(scores.basal_cortex_left)
    .bind(scores.basal_cortex_right)
    .bind(scores.corona_left)
    .bind(scores.corona_right)
    .bind(notes)
    .bind(time::to_db(&time::now()))
    .execute(&mut *conn)
    .await?;

    Ok(ImageEvaluation {
        id: result.last_insert_rowid(),
        doctor_id,
        image_id: image_id.to_string(),
        session_id,
        region,
        scores: *scores,
        notes: notes.map(str::to_string),
    })
}

pub async fn image_evaluation_exists(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    image_id: &str,
    session_id: Uuid,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM image_evaluations
            WHERE doctor_id = ? AND image_id = ? AND session_id = ?
        )
        "#,
    )
    .bind(doctor_id.to_string())
    .bind(image_id)
    .bind(session_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

pub async fn find_image_evaluation(
    conn: &mut SqliteConnection,
    evaluation_id: i64,
) -> Result<Option<ImageEvaluation>> {
    let row = sqlx::query("SELECT * FROM image_evaluations WHERE id = ?")
        .bind(evaluation_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(image_evaluation_from_row).transpose()
}

pub async fn delete_image_evaluation(conn: &mut SqliteConnection, evaluation_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM image_evaluations WHERE id = ?")
        .bind(evaluation_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Every image evaluation, tagged with its parent set, in insertion order
pub async fn all_image_evaluations(
    conn: &mut SqliteConnection,
) -> Result<Vec<SetScopedEvaluation>> {
    let rows = sqlx::query(
        r#"
        SELECT e.*, i.image_set_id AS parent_set_id
        FROM image_evaluations e
        JOIN images i ON i.image_id = e.image_id
        ORDER BY e.id ASC
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<SetScopedEvaluation> {
            Ok(SetScopedEvaluation {
                image_set_id: row.try_get("parent_set_id")?,
                evaluation: image_evaluation_from_row(row)?,
            })
        })
        .collect()
}

pub async fn insert_set_evaluation(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    image_set_id: &str,
    session_id: Uuid,
    is_low_quality: bool,
    is_irrelevant: bool,
) -> Result<ImageSetEvaluation> {
    let result = sqlx::query(
        r#"
        INSERT INTO image_set_evaluations (
            doctor_id, image_set_id, session_id, is_low_quality, is_irrelevant, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(doctor_id.to_string())
    .bind(image_set_id)
    .bind(session_id.to_string())
    .bind(is_low_quality)
    .bind(is_irrelevant)
    .bind(time::to_db(&time::now()))
    .execute(&mut *conn)
    .await?;

    Ok(ImageSetEvaluation {
        id: result.last_insert_rowid(),
        doctor_id,
        image_set_id: image_set_id.to_string(),
        session_id,
        is_low_quality,
        is_irrelevant,
    })
}

pub async fn set_evaluation_exists(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    image_set_id: &str,
    session_id: Uuid,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM image_set_evaluations
            WHERE doctor_id = ? AND image_set_id = ? AND session_id = ?
        )
        "#,
    )
    .bind(doctor_id.to_string())
    .bind(image_set_id)
    .bind(session_id.to_string())
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

pub async fn all_set_evaluations(conn: &mut SqliteConnection) -> Result<Vec<ImageSetEvaluation>> {
    let rows = sqlx::query("SELECT * FROM image_set_evaluations ORDER BY id ASC")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(set_evaluation_from_row).collect()
}

/// Sets the doctor evaluated in any session, at either level, in set order
pub async fn evaluated_set_ids(conn: &mut SqliteConnection, doctor_id: Uuid) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT s.image_set_id
        FROM image_sets s
        WHERE s.image_set_id IN (
            SELECT i.image_set_id
            FROM image_evaluations e
            JOIN images i ON i.image_id = e.image_id
            WHERE e.doctor_id = ?
            UNION
            SELECT image_set_id FROM image_set_evaluations WHERE doctor_id = ?
        )
        ORDER BY s.set_index ASC
        "#,
    )
    .bind(doctor_id.to_string())
    .bind(doctor_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

/// Rating count per set: distinct (doctor, session) pairs that evaluated it
///
/// Sets nobody has rated are absent from the map.
pub async fn rating_counts(conn: &mut SqliteConnection) -> Result<HashMap<String, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT image_set_id, COUNT(*) AS ratings
        FROM (
            SELECT i.image_set_id, e.doctor_id, e.session_id
            FROM image_evaluations e
            JOIN images i ON i.image_id = e.image_id
            UNION
            SELECT image_set_id, doctor_id, session_id FROM image_set_evaluations
        )
        GROUP BY image_set_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<(String, i64)> {
            Ok((row.try_get("image_set_id")?, row.try_get("ratings")?))
        })
        .collect()
}

/// Slices of one set tagged with `region`, per reviewer session
pub async fn region_tags(
    conn: &mut SqliteConnection,
    image_set_id: &str,
    region: Region,
) -> Result<Vec<RegionTag>> {
    let rows = sqlx::query(
        r#"
        SELECT e.doctor_id, e.session_id, i.slice_index
        FROM image_evaluations e
        JOIN images i ON i.image_id = e.image_id
        WHERE i.image_set_id = ? AND e.region = ?
        ORDER BY e.doctor_id, e.session_id, i.slice_index
        "#,
    )
    .bind(image_set_id)
    .bind(region.as_str())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<RegionTag> {
            Ok(RegionTag {
                doctor_id: uuid_column(row, "doctor_id")?,
                session_id: uuid_column(row, "session_id")?,
                slice_index: row.try_get("slice_index")?,
            })
        })
        .collect()
}
