//! HTTP error mapping for medfabric-annotate
//!
//! Domain errors keep their kind on the wire as a stable code. Storage and
//! other internal failures are logged here and reach the client only as a
//! generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medfabric_common::{
    AuthError, Error, EvaluationError, ImageError, ImageSetError, PatientError, ReconcileError,
    SessionError,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request parameter (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Common(#[from] Error),
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Common(err.into())
    }
}

fn classify(err: &Error) -> (StatusCode, &'static str) {
    use StatusCode as S;
    match err {
        Error::Session(e) => match e {
            SessionError::NotFound(_) => (S::UNAUTHORIZED, "SESSION_NOT_FOUND"),
            SessionError::Mismatch(_) => (S::FORBIDDEN, "SESSION_MISMATCH"),
            SessionError::Inactive(_) => (S::UNAUTHORIZED, "SESSION_INACTIVE"),
            SessionError::AlreadyExists(_) => (S::CONFLICT, "SESSION_EXISTS"),
        },
        Error::Auth(e) => match e {
            AuthError::InvalidCredentials => (S::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::UserNotFound(_) => (S::NOT_FOUND, "USER_NOT_FOUND"),
            AuthError::Unauthorized(_) => (S::FORBIDDEN, "UNAUTHORIZED"),
            AuthError::UsernameTaken(_) => (S::CONFLICT, "USERNAME_TAKEN"),
            AuthError::InvalidUsername(_) => (S::BAD_REQUEST, "INVALID_USERNAME"),
        },
        Error::Evaluation(e) => match e {
            EvaluationError::AlreadyExists(_) => (S::CONFLICT, "EVALUATION_EXISTS"),
            EvaluationError::NotFound(_) => (S::NOT_FOUND, "EVALUATION_NOT_FOUND"),
            EvaluationError::Invalid(_) => (S::UNPROCESSABLE_ENTITY, "INVALID_EVALUATION"),
        },
        Error::ImageSet(e) => match e {
            ImageSetError::NotFound(_) => (S::NOT_FOUND, "IMAGE_SET_NOT_FOUND"),
            ImageSetError::AlreadyExists(_) => (S::CONFLICT, "IMAGE_SET_EXISTS"),
            ImageSetError::InvalidPath(_) => (S::UNPROCESSABLE_ENTITY, "IMAGE_SET_INVALID_PATH"),
            ImageSetError::Invalid(_) => (S::BAD_REQUEST, "INVALID_IMAGE_SET"),
        },
        Error::Image(e) => match e {
            ImageError::NotFound(_) => (S::NOT_FOUND, "IMAGE_NOT_FOUND"),
            ImageError::AlreadyExists(_) => (S::CONFLICT, "IMAGE_EXISTS"),
            ImageError::Invalid(_) => (S::BAD_REQUEST, "INVALID_IMAGE"),
        },
        Error::Patient(e) => match e {
            PatientError::NotFound(_) => (S::NOT_FOUND, "PATIENT_NOT_FOUND"),
            PatientError::AlreadyExists(_) => (S::CONFLICT, "PATIENT_EXISTS"),
            PatientError::Invalid(_) => (S::BAD_REQUEST, "INVALID_PATIENT"),
        },
        Error::Reconcile(e) => match e {
            ReconcileError::EmptyInput => (S::BAD_REQUEST, "EMPTY_INPUT"),
            ReconcileError::UnsupportedStrategy(_) => (S::BAD_REQUEST, "UNSUPPORTED_STRATEGY"),
        },
        Error::InvalidInput(_) => (S::BAD_REQUEST, "BAD_REQUEST"),
        Error::Database(_) => (S::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
            (S::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Common(err) => {
                let (status, code) = classify(&err);
                let message = if status.is_server_error() {
                    tracing::error!(error = %err, code, "Request failed");
                    "The request could not be completed; see server log".to_string()
                } else {
                    err.to_string()
                };
                (status, code, message)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_evaluation_is_conflict() {
        let err: Error = EvaluationError::AlreadyExists("x".to_string()).into();
        assert_eq!(classify(&err), (StatusCode::CONFLICT, "EVALUATION_EXISTS"));
    }

    #[test]
    fn test_database_error_hides_driver_text() {
        let response = ApiError::from(Error::Database(sqlx::Error::PoolTimedOut)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_session_kinds_are_distinct() {
        let inactive: Error = SessionError::Inactive("s".to_string()).into();
        let mismatch: Error = SessionError::Mismatch("s".to_string()).into();
        assert_eq!(classify(&inactive).1, "SESSION_INACTIVE");
        assert_eq!(classify(&mismatch).0, StatusCode::FORBIDDEN);
    }
}
