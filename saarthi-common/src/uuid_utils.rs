//! Session identifier utilities

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// True when `s` is a canonical hyphenated UUID, the only form ever issued
/// as a session id. Anything else can be rejected before touching storage.
pub fn is_session_id(s: &str) -> bool {
    s.len() == 36 && parse(s).is_ok()
}
