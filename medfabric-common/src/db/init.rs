//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates every table the
//! annotation engine needs. Table creation is idempotent and safe to run on
//! every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection options apply to every pooled connection, unlike a one-off PRAGMA
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_doctors_table(pool).await?;
    create_sessions_table(pool).await?;
    create_patients_table(pool).await?;
    create_image_sets_table(pool).await?;
    create_images_table(pool).await?;
    create_image_evaluations_table(pool).await?;
    create_image_set_evaluations_table(pool).await?;
    create_conflicts_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_doctors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doctors (
            doctor_id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'labeler',
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Sessions are deactivated, never deleted
async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id),
            login_time TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_doctor ON sessions(doctor_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_patients_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS patients (
            patient_id TEXT PRIMARY KEY,
            category TEXT,
            age INTEGER,
            gender TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_image_sets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_sets (
            set_index INTEGER PRIMARY KEY AUTOINCREMENT,
            image_set_id TEXT NOT NULL UNIQUE,
            patient_id TEXT REFERENCES patients(patient_id),
            num_images INTEGER NOT NULL CHECK (num_images > 0),
            folder_path TEXT,
            conflicted INTEGER NOT NULL DEFAULT 0,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            image_id TEXT PRIMARY KEY,
            image_set_id TEXT NOT NULL REFERENCES image_sets(image_set_id) ON DELETE CASCADE,
            slice_index INTEGER NOT NULL CHECK (slice_index >= 0),
            UNIQUE (image_set_id, slice_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One evaluation per (doctor, image, session)
async fn create_image_evaluations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_evaluations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE,
            image_id TEXT NOT NULL REFERENCES images(image_id),
            session_id TEXT NOT NULL REFERENCES sessions(session_id),
            region TEXT NOT NULL DEFAULT 'None',
            basal_score_central_left INTEGER,
            basal_score_central_right INTEGER,
            basal_score_cortex_left INTEGER,
            basal_score_cortex_right INTEGER,
            corona_score_left INTEGER,
            corona_score_right INTEGER,
            notes TEXT,
            created_at TEXT NOT NULL,
            CONSTRAINT uq_image_eval UNIQUE (doctor_id, image_id, session_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_image_evaluations_image ON image_evaluations(image_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One subject-level verdict per (doctor, image set, session)
async fn create_image_set_evaluations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS image_set_evaluations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doctor_id TEXT NOT NULL REFERENCES doctors(doctor_id) ON DELETE CASCADE,
            image_set_id TEXT NOT NULL REFERENCES image_sets(image_set_id) ON DELETE CASCADE,
            session_id TEXT NOT NULL REFERENCES sessions(session_id) ON DELETE CASCADE,
            is_low_quality INTEGER NOT NULL DEFAULT 0,
            is_irrelevant INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            CONSTRAINT uq_eval_triplet UNIQUE (doctor_id, image_set_id, session_id),
            CHECK (is_low_quality = 1 OR is_irrelevant = 1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Conflicts keyed by (image set, image or subject level, type)
///
/// SQLite treats NULLs as distinct inside UNIQUE, so the key uses an
/// expression index over `COALESCE(image_id, '')`.
async fn create_conflicts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conflicts (
            conflict_id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_set_id TEXT NOT NULL REFERENCES image_sets(image_set_id) ON DELETE CASCADE,
            image_id TEXT REFERENCES images(image_id),
            conflict_type TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_conflict_key
        ON conflicts(image_set_id, COALESCE(image_id, ''), conflict_type)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
