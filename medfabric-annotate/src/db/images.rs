//! Image (slice) records

use medfabric_common::db::models::Image;
use medfabric_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

fn image_from_row(row: &SqliteRow) -> Result<Image> {
    Ok(Image {
        image_id: row.try_get("image_id")?,
        image_set_id: row.try_get("image_set_id")?,
        slice_index: row.try_get("slice_index")?,
    })
}

pub async fn insert_image(conn: &mut SqliteConnection, image: &Image) -> Result<()> {
    sqlx::query("INSERT INTO images (image_id, image_set_id, slice_index) VALUES (?, ?, ?)")
        .bind(&image.image_id)
        .bind(&image.image_set_id)
        .bind(image.slice_index)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn find_image(conn: &mut SqliteConnection, image_id: &str) -> Result<Option<Image>> {
    let row = sqlx::query("SELECT image_id, image_set_id, slice_index FROM images WHERE image_id = ?")
        .bind(image_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(image_from_row).transpose()
}

pub async fn exists_at_slice(
    conn: &mut SqliteConnection,
    image_set_id: &str,
    slice_index: i64,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM images WHERE image_set_id = ? AND slice_index = ?)",
    )
    .bind(image_set_id)
    .bind(slice_index)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Images of one set in ascending slice order
pub async fn list_for_set(conn: &mut SqliteConnection, image_set_id: &str) -> Result<Vec<Image>> {
    let rows = sqlx::query(
        "SELECT image_id, image_set_id, slice_index FROM images WHERE image_set_id = ? ORDER BY slice_index ASC",
    )
    .bind(image_set_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(image_from_row).collect()
}
