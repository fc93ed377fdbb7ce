//! Timestamp utilities
//!
//! Timestamps are persisted as RFC 3339 text.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339()
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_storage_round_trip_keeps_instant() {
        let timestamp = now();
        let parsed = from_db(&to_db(&timestamp)).unwrap();
        assert_eq!(parsed, timestamp);
    }

    #[test]
    fn test_from_db_rejects_garbage() {
        assert!(matches!(from_db("yesterday"), Err(Error::Internal(_))));
    }
}
