//! Login session records

use medfabric_common::db::models::SessionRecord;
use medfabric_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{timestamp_column, uuid_column};

fn session_from_row(row: &SqliteRow) -> Result<SessionRecord> {
    Ok(SessionRecord {
        session_id: uuid_column(row, "session_id")?,
        doctor_id: uuid_column(row, "doctor_id")?,
        login_time: timestamp_column(row, "login_time")?,
        is_active: row.try_get("is_active")?,
    })
}

pub async fn insert_session(conn: &mut SqliteConnection, session: &SessionRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO sessions (session_id, doctor_id, login_time, is_active) VALUES (?, ?, ?, ?)",
    )
    .bind(session.session_id.to_string())
    .bind(session.doctor_id.to_string())
    .bind(time::to_db(&session.login_time))
    .bind(session.is_active)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_session(
    conn: &mut SqliteConnection,
    session_id: Uuid,
) -> Result<Option<SessionRecord>> {
    let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Mark a session inactive; returns the number of rows touched
pub async fn deactivate(conn: &mut SqliteConnection, session_id: Uuid) -> Result<u64> {
    let result = sqlx::query("UPDATE sessions SET is_active = 0 WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

pub async fn list_active(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
) -> Result<Vec<SessionRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM sessions WHERE doctor_id = ? AND is_active = 1 ORDER BY login_time ASC",
    )
    .bind(doctor_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(session_from_row).collect()
}
