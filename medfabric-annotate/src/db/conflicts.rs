//! Conflict records, written only by the conflict scanner

use medfabric_common::db::models::{Conflict, ConflictType};
use medfabric_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

fn conflict_from_row(row: &SqliteRow) -> Result<Conflict> {
    let conflict_type: String = row.try_get("conflict_type")?;
    Ok(Conflict {
        conflict_id: row.try_get("conflict_id")?,
        image_set_id: row.try_get("image_set_id")?,
        image_id: row.try_get("image_id")?,
        conflict_type: conflict_type.parse::<ConflictType>()?,
        resolved: row.try_get("resolved")?,
    })
}

pub async fn all_conflicts(conn: &mut SqliteConnection) -> Result<Vec<Conflict>> {
    let rows = sqlx::query("SELECT * FROM conflicts ORDER BY conflict_id ASC")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(conflict_from_row).collect()
}

pub async fn insert_conflict(
    conn: &mut SqliteConnection,
    image_set_id: &str,
    image_id: Option<&str>,
    conflict_type: ConflictType,
) -> Result<()> {
    let now = time::to_db(&time::now());
    sqlx::query(
        r#"
        INSERT INTO conflicts (image_set_id, image_id, conflict_type, resolved, created_at, updated_at)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(image_set_id)
    .bind(image_id)
    .bind(conflict_type.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn set_resolved(
    conn: &mut SqliteConnection,
    conflict_id: i64,
    resolved: bool,
) -> Result<()> {
    sqlx::query("UPDATE conflicts SET resolved = ?, updated_at = ? WHERE conflict_id = ?")
        .bind(resolved)
        .bind(time::to_db(&time::now()))
        .bind(conflict_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn unresolved_for_set(
    conn: &mut SqliteConnection,
    image_set_id: &str,
) -> Result<Vec<Conflict>> {
    let rows = sqlx::query(
        "SELECT * FROM conflicts WHERE image_set_id = ? AND resolved = 0 ORDER BY conflict_id ASC",
    )
    .bind(image_set_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(conflict_from_row).collect()
}

/// Sets holding at least one unresolved conflict at any level
pub async fn unresolved_set_ids(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT image_set_id FROM conflicts WHERE resolved = 0 ORDER BY image_set_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}
