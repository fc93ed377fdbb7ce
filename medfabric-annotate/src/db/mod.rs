//! Database access layer for medfabric-annotate
//!
//! Every function takes a `&mut SqliteConnection` so the same query can run
//! on a pooled connection or inside an open transaction (`&mut *tx`).
//! Schema creation lives in `medfabric_common::db::init`.

pub mod conflicts;
pub mod doctors;
pub mod evaluations;
pub mod image_sets;
pub mod images;
pub mod patients;
pub mod sessions;

use medfabric_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

pub(crate) fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    uuid_utils::from_db(&value)
}

pub(crate) fn timestamp_column(
    row: &SqliteRow,
    column: &str,
) -> Result<chrono::DateTime<chrono::Utc>> {
    let value: String = row.try_get(column)?;
    time::from_db(&value)
}
