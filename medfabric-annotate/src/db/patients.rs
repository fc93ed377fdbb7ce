//! Patient records

use medfabric_common::db::models::{Gender, Patient};
use medfabric_common::Result;
use sqlx::{Row, SqliteConnection};

pub async fn insert_patient(conn: &mut SqliteConnection, patient: &Patient) -> Result<()> {
    sqlx::query("INSERT INTO patients (patient_id, category, age, gender) VALUES (?, ?, ?, ?)")
        .bind(&patient.patient_id)
        .bind(&patient.category)
        .bind(patient.age)
        .bind(patient.gender.map(|g| g.as_str()))
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn exists(conn: &mut SqliteConnection, patient_id: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM patients WHERE patient_id = ?)")
            .bind(patient_id)
            .fetch_one(&mut *conn)
            .await?;

    Ok(exists)
}

pub async fn find_patient(conn: &mut SqliteConnection, patient_id: &str) -> Result<Option<Patient>> {
    let row = sqlx::query("SELECT patient_id, category, age, gender FROM patients WHERE patient_id = ?")
        .bind(patient_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let gender: Option<String> = row.try_get("gender")?;
    Ok(Some(Patient {
        patient_id: row.try_get("patient_id")?,
        category: row.try_get("category")?,
        age: row.try_get("age")?,
        gender: gender.map(|g| g.parse::<Gender>()).transpose()?,
    }))
}
