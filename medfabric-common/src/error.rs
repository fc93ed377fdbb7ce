//! Common error types for MedFabric
//!
//! Errors are grouped by domain. Validation and duplicate-check failures are
//! returned before anything is written; storage failures keep the original
//! `sqlx::Error` as their source.

use thiserror::Error;

/// Common result type for MedFabric operations
pub type Result<T> = std::result::Result<T, Error>;

/// Session lookup and ownership failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Unknown or malformed session id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Session belongs to a different reviewer
    #[error("Session {0} does not belong to the given doctor")]
    Mismatch(String),

    /// Session was deactivated (logout)
    #[error("Session {0} is not active")]
    Inactive(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),
}

/// Identity and authorization failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Doctor not found: {0}")]
    UserNotFound(String),

    /// Reviewer tried to act on a record owned by someone else
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),
}

/// Evaluation submission failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// One evaluation per (reviewer, subject or item, session)
    #[error("Evaluation already exists: {0}")]
    AlreadyExists(String),

    #[error("Evaluation not found: {0}")]
    NotFound(String),

    /// Region/score combination or bounds violated
    #[error("Invalid evaluation: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageSetError {
    #[error("Image set not found: {0}")]
    NotFound(String),

    #[error("Image set already exists: {0}")]
    AlreadyExists(String),

    #[error("Image set has no resolvable folder path: {0}")]
    InvalidPath(String),

    #[error("Invalid image set: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Image already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid image: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatientError {
    #[error("Patient not found: {0}")]
    NotFound(String),

    #[error("Patient already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid patient data: {0}")]
    Invalid(String),
}

/// Consensus value reconciliation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Cannot reconcile an empty list of values")]
    EmptyInput,

    #[error("Unsupported reconciliation strategy: {0}")]
    UnsupportedStrategy(String),
}

/// Common error types across MedFabric components
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    ImageSet(#[from] ImageSetError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Patient(#[from] PatientError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data could not be decoded
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying storage error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(err) => is_unique_violation(err),
            _ => false,
        }
    }
}

/// Check a raw sqlx error for a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
