//! UUID utilities

use uuid::Uuid;

use crate::{Error, Result};

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string, `None` when malformed
///
/// Input is taken as-is: surrounding whitespace makes it malformed.
pub fn parse(s: &str) -> Option<Uuid> {
    Uuid::parse_str(s).ok()
}

/// Parse a UUID read back from the database
pub fn from_db(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid stored UUID '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_generated() {
        let id = generate();
        assert_eq!(parse(&id.to_string()), Some(id));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse("not-a-uuid"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn test_parse_rejects_padded_input() {
        let id = generate();
        assert_eq!(parse(&format!(" {} ", id)), None);
        assert_eq!(parse(&format!("{}\n", id)), None);
    }
}
