//! Reviewer registration and credential checks
//!
//! Secret hashing sits behind [`SecretHasher`] so deployments can swap in a
//! stronger scheme without touching the registry.

use medfabric_common::db::models::{Doctor, Role};
use medfabric_common::{time, uuid_utils, AuthError, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;

use crate::db::doctors;

pub const MIN_USERNAME_LEN: usize = 3;

pub trait SecretHasher: Send + Sync {
    /// Fresh salt for a new secret
    fn generate_salt(&self) -> String;

    fn hash(&self, secret: &str, salt: &str) -> String;

    fn verify(&self, secret: &str, salt: &str, expected: &str) -> bool {
        self.hash(secret, salt) == expected
    }
}

/// Salted SHA-256, hex encoded
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256SecretHasher;

impl SecretHasher for Sha256SecretHasher {
    fn generate_salt(&self) -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn hash(&self, secret: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

pub async fn register_doctor(
    conn: &mut SqliteConnection,
    hasher: &dyn SecretHasher,
    username: &str,
    password: &str,
    role: Role,
) -> Result<Doctor> {
    let username = username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AuthError::InvalidUsername(format!(
            "'{}' is shorter than {} characters",
            username, MIN_USERNAME_LEN
        ))
        .into());
    }

    if doctors::find_by_username(conn, username).await?.is_some() {
        return Err(AuthError::UsernameTaken(username.to_string()).into());
    }

    let salt = hasher.generate_salt();
    let doctor = Doctor {
        doctor_id: uuid_utils::generate(),
        username: username.to_string(),
        role,
        password_hash: hasher.hash(password, &salt),
        password_salt: salt,
        created_at: time::now(),
    };

    doctors::insert_doctor(conn, &doctor).await.map_err(|e| {
        if e.is_unique_violation() {
            AuthError::UsernameTaken(username.to_string()).into()
        } else {
            e
        }
    })?;

    tracing::info!(doctor_id = %doctor.doctor_id, username, role = doctor.role.as_str(), "Doctor registered");
    Ok(doctor)
}

/// Identity for a username/secret pair
pub async fn verify_credentials(
    conn: &mut SqliteConnection,
    hasher: &dyn SecretHasher,
    username: &str,
    password: &str,
) -> Result<Doctor> {
    let Some(doctor) = doctors::find_by_username(conn, username.trim()).await? else {
        return Err(AuthError::UserNotFound(username.to_string()).into());
    };

    if !hasher.verify(password, &doctor.password_salt, &doctor.password_hash) {
        tracing::warn!(username, "Rejected login with wrong secret");
        return Err(AuthError::InvalidCredentials.into());
    }

    Ok(doctor)
}
