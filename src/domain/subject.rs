//! Subject identifiers.
//!
//! A subject is the entity whose following and presence data is cached:
//! in practice a platform user id. Ids arrive from untrusted callers, so
//! they are validated once at the service boundary and carried as a
//! newtype everywhere below it.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

const MAX_SUBJECT_ID_LEN: usize = 64;

/// Validated subject identifier.
///
/// Accepts ASCII alphanumerics plus `-`, `_`, `:` and `.`, at most 64
/// bytes, never empty. Deserialization is transparent: payloads written
/// by this crate are trusted round-trips; external input goes through
/// [`SubjectId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Validate and wrap a raw id.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("subject id must not be empty"));
        }
        if trimmed.len() > MAX_SUBJECT_ID_LEN {
            return Err(DomainError::validation(format!(
                "subject id exceeds {MAX_SUBJECT_ID_LEN} bytes"
            )));
        }
        if !trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
        {
            return Err(DomainError::validation(format!(
                "subject id `{trimmed}` contains unsupported characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_id_shapes() {
        for raw in ["u123", "5f3a9c", "user_42", "did:plc:abc-123", "a.b"] {
            assert!(SubjectId::parse(raw).is_ok(), "rejected `{raw}`");
        }
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id = SubjectId::parse("  u1  ").expect("trimmed id should parse");
        assert_eq!(id.as_str(), "u1");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(SubjectId::parse("").is_err());
        assert!(SubjectId::parse("   ").is_err());
    }

    #[test]
    fn rejects_unsupported_characters() {
        assert!(SubjectId::parse("user one").is_err());
        assert!(SubjectId::parse("user/one").is_err());
        assert!(SubjectId::parse("usér").is_err());
    }

    #[test]
    fn rejects_oversized_ids() {
        let raw = "a".repeat(MAX_SUBJECT_ID_LEN + 1);
        assert!(SubjectId::parse(&raw).is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let id = SubjectId::parse("u1").expect("id should parse");
        let json = serde_json::to_string(&id).expect("id should serialize");
        assert_eq!(json, "\"u1\"");
        let back: SubjectId = serde_json::from_str(&json).expect("id should deserialize");
        assert_eq!(back, id);
    }
}
