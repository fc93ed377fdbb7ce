//! Reviewer (doctor) records

use medfabric_common::db::models::{Doctor, Role};
use medfabric_common::{time, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{timestamp_column, uuid_column};

fn doctor_from_row(row: &SqliteRow) -> Result<Doctor> {
    let role: String = row.try_get("role")?;
    Ok(Doctor {
        doctor_id: uuid_column(row, "doctor_id")?,
        username: row.try_get("username")?,
        role: role.parse::<Role>()?,
        password_hash: row.try_get("password_hash")?,
        password_salt: row.try_get("password_salt")?,
        created_at: timestamp_column(row, "created_at")?,
    })
}

/// Insert a new doctor; a duplicate username surfaces as a UNIQUE violation
pub async fn insert_doctor(conn: &mut SqliteConnection, doctor: &Doctor) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO doctors (doctor_id, username, role, password_hash, password_salt, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(doctor.doctor_id.to_string())
    .bind(&doctor.username)
    .bind(doctor.role.as_str())
    .bind(&doctor.password_hash)
    .bind(&doctor.password_salt)
    .bind(time::to_db(&doctor.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_id(conn: &mut SqliteConnection, doctor_id: Uuid) -> Result<Option<Doctor>> {
    let row = sqlx::query("SELECT * FROM doctors WHERE doctor_id = ?")
        .bind(doctor_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(doctor_from_row).transpose()
}

pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<Doctor>> {
    let row = sqlx::query("SELECT * FROM doctors WHERE username = ?")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(doctor_from_row).transpose()
}

pub async fn exists(conn: &mut SqliteConnection, doctor_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM doctors WHERE doctor_id = ?)")
        .bind(doctor_id.to_string())
        .fetch_one(&mut *conn)
        .await?;

    Ok(exists)
}
