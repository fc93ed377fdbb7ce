//! Image set (subject) records

use medfabric_common::db::models::ImageSet;
use medfabric_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

fn image_set_from_row(row: &SqliteRow) -> Result<ImageSet> {
    Ok(ImageSet {
        set_index: row.try_get("set_index")?,
        image_set_id: row.try_get("image_set_id")?,
        patient_id: row.try_get("patient_id")?,
        num_images: row.try_get("num_images")?,
        folder_path: row.try_get("folder_path")?,
        conflicted: row.try_get("conflicted")?,
        description: row.try_get("description")?,
    })
}

/// Insert a new image set; returns the assigned `set_index`
pub async fn insert_image_set(
    conn: &mut SqliteConnection,
    image_set_id: &str,
    patient_id: Option<&str>,
    num_images: i64,
    folder_path: Option<&str>,
    description: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO image_sets (image_set_id, patient_id, num_images, folder_path, conflicted, description)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(image_set_id)
    .bind(patient_id)
    .bind(num_images)
    .bind(folder_path)
    .bind(description)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_image_set(
    conn: &mut SqliteConnection,
    image_set_id: &str,
) -> Result<Option<ImageSet>> {
    let row = sqlx::query("SELECT * FROM image_sets WHERE image_set_id = ?")
        .bind(image_set_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(image_set_from_row).transpose()
}

pub async fn exists(conn: &mut SqliteConnection, image_set_id: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM image_sets WHERE image_set_id = ?)")
            .bind(image_set_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(exists)
}

/// All image sets in ingestion order
pub async fn list_image_sets(conn: &mut SqliteConnection) -> Result<Vec<ImageSet>> {
    let rows = sqlx::query("SELECT * FROM image_sets ORDER BY set_index ASC")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(image_set_from_row).collect()
}

/// Current `conflicted` flag, `None` if the set does not exist
pub async fn conflicted_flag(conn: &mut SqliteConnection, image_set_id: &str) -> Result<Option<bool>> {
    let flag: Option<bool> =
        sqlx::query_scalar("SELECT conflicted FROM image_sets WHERE image_set_id = ?")
            .bind(image_set_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(flag)
}

pub async fn set_conflicted(
    conn: &mut SqliteConnection,
    image_set_id: &str,
    conflicted: bool,
) -> Result<()> {
    sqlx::query("UPDATE image_sets SET conflicted = ? WHERE image_set_id = ?")
        .bind(conflicted)
        .bind(image_set_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}
