//! Identity and session gate
//!
//! Every evaluation write calls [`authorize`] first, inside the same
//! transaction as the write, so a session deactivated before the write
//! transaction starts is always observed as inactive.

use medfabric_common::db::models::SessionRecord;
use medfabric_common::{uuid_utils, AuthError, Result, SessionError};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::{doctors, sessions};

/// Check that `doctor_id` exists and owns the active session `session_id`
///
/// The session id is taken as presented by the caller; a malformed id is
/// reported the same way as an unknown one.
pub async fn authorize(
    conn: &mut SqliteConnection,
    doctor_id: Uuid,
    session_id: &str,
) -> Result<SessionRecord> {
    if !doctors::exists(conn, doctor_id).await? {
        return Err(AuthError::UserNotFound(doctor_id.to_string()).into());
    }

    let Some(parsed) = uuid_utils::parse(session_id) else {
        return Err(SessionError::NotFound(session_id.to_string()).into());
    };

    let Some(session) = sessions::find_session(conn, parsed).await? else {
        return Err(SessionError::NotFound(session_id.to_string()).into());
    };

    if session.doctor_id != doctor_id {
        tracing::warn!(
            session_id = %parsed,
            doctor_id = %doctor_id,
            "Session presented by a doctor who does not own it"
        );
        return Err(SessionError::Mismatch(session_id.to_string()).into());
    }

    if !session.is_active {
        return Err(SessionError::Inactive(session_id.to_string()).into());
    }

    Ok(session)
}
