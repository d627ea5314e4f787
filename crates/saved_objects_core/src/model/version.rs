//! Opaque version tokens for optimistic concurrency control.
//!
//! A token is the base64 encoding of the JSON array `[seq_no, primary_term]`.
//! Tokens are compared only for equality by the store; they carry no ordering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Write precondition checked by the store against the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPrecondition {
    pub if_seq_no: i64,
    pub if_primary_term: i64,
}

impl VersionPrecondition {
    pub fn new(if_seq_no: i64, if_primary_term: i64) -> Self {
        Self {
            if_seq_no,
            if_primary_term,
        }
    }
}

/// Version token could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidVersionError {
    pub version: String,
}

impl Display for InvalidVersionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid version [{}]", self.version)
    }
}

impl Error for InvalidVersionError {}

/// Encodes `(seq_no, primary_term)` into an opaque version token.
pub fn encode_version(seq_no: i64, primary_term: i64) -> String {
    STANDARD.encode(format!("[{seq_no},{primary_term}]"))
}

/// Encodes the version of a stored hit, when the store reported both parts.
pub fn encode_hit_version(seq_no: Option<i64>, primary_term: Option<i64>) -> Option<String> {
    match (seq_no, primary_term) {
        (Some(seq_no), Some(primary_term)) => Some(encode_version(seq_no, primary_term)),
        _ => None,
    }
}

/// Decodes a version token back into `(seq_no, primary_term)`.
///
/// # Errors
/// - Returns an error for invalid base64, non-JSON payloads, arrays whose
///   length is not two, or entries that are not integers.
pub fn decode_version(version: &str) -> Result<(i64, i64), InvalidVersionError> {
    let invalid = || InvalidVersionError {
        version: version.to_string(),
    };

    let bytes = STANDARD.decode(version.trim()).map_err(|_| invalid())?;
    let parsed: Value = serde_json::from_slice(&bytes).map_err(|_| invalid())?;
    match parsed.as_array().map(Vec::as_slice) {
        Some([seq_no, primary_term]) => {
            let seq_no = seq_no.as_i64().ok_or_else(invalid)?;
            let primary_term = primary_term.as_i64().ok_or_else(invalid)?;
            Ok((seq_no, primary_term))
        }
        _ => Err(invalid()),
    }
}

/// Decodes a caller-supplied version into a write precondition.
pub fn decode_request_version(version: &str) -> Result<VersionPrecondition, InvalidVersionError> {
    let (seq_no, primary_term) = decode_version(version)?;
    Ok(VersionPrecondition::new(seq_no, primary_term))
}

#[cfg(test)]
mod tests {
    use super::{decode_request_version, decode_version, encode_hit_version, encode_version};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    #[test]
    fn decode_reverses_encode() {
        for (seq_no, primary_term) in [(0, 1), (5, 1), (123_456, 7), (i64::MAX, i64::MAX)] {
            let token = encode_version(seq_no, primary_term);
            assert_eq!(decode_version(&token).unwrap(), (seq_no, primary_term));
        }
    }

    #[test]
    fn token_is_base64_json_pair() {
        assert_eq!(encode_version(5, 1), STANDARD.encode("[5,1]"));
    }

    #[test]
    fn request_version_becomes_precondition() {
        let precondition = decode_request_version(&encode_version(9, 2)).unwrap();
        assert_eq!(precondition.if_seq_no, 9);
        assert_eq!(precondition.if_primary_term, 2);
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let bad = [
            "not base64!".to_string(),
            STANDARD.encode("not json"),
            STANDARD.encode("[1]"),
            STANDARD.encode("[1,2,3]"),
            STANDARD.encode("[\"1\",2]"),
            STANDARD.encode("[1.5,2]"),
            STANDARD.encode("{\"seq\":1}"),
        ];
        for token in bad {
            let err = decode_version(&token).expect_err("malformed token must fail");
            assert_eq!(err.version, token);
            assert!(err.to_string().starts_with("Invalid version"));
        }
    }

    #[test]
    fn hit_version_requires_both_parts() {
        assert!(encode_hit_version(Some(1), None).is_none());
        assert!(encode_hit_version(None, Some(1)).is_none());
        assert_eq!(encode_hit_version(Some(1), Some(1)), Some(encode_version(1, 1)));
    }
}
