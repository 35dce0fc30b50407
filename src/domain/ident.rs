//! Identifier grammar shared by every id-bearing field.
//!
//! Ids are opaque strings matching `^[A-Za-z0-9_-]{1,64}$`. Anything else is
//! treated as `unknown` before it can reach a store query.

/// Maximum identifier length.
pub const MAX_ID_LEN: usize = 64;

/// Placeholder sender recorded when an extracted id fails validation.
pub const UNKNOWN_ID: &str = "unknown";

/// Check a candidate against the identifier grammar.
pub fn is_valid_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_ID_LEN
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validate a candidate, returning it only when it matches the grammar.
pub fn checked(s: &str) -> Option<&str> {
    is_valid_id(s).then_some(s)
}

/// Validate a candidate, falling back to [`UNKNOWN_ID`] when it does not match.
pub fn or_unknown(s: &str) -> &str {
    checked(s).unwrap_or(UNKNOWN_ID)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_grammar() {
        assert!(is_valid_id("a1"));
        assert!(is_valid_id("agent-42_B"));
        assert!(is_valid_id(&"x".repeat(64)));
    }

    #[test]
    fn test_rejects_out_of_grammar() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id(&"x".repeat(65)));
        assert!(!is_valid_id("has space"));
        assert!(!is_valid_id("path/x.py"));
        assert!(!is_valid_id("semi;colon"));
        assert!(!is_valid_id("uni\u{e9}"));
    }

    #[test]
    fn test_or_unknown() {
        assert_eq!(or_unknown("ok-id"), "ok-id");
        assert_eq!(or_unknown("not ok"), UNKNOWN_ID);
    }
}
