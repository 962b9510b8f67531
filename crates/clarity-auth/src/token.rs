//! Bearer token claims
//!
//! The access token is a JWT-shaped `header.payload.signature` string. The
//! client never verifies it; the payload is read only to learn which subject
//! the session belongs to. Nothing here is a trust decision.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value;

use crate::error::{Error, Result};

/// Claim holding the subject identifier.
const SUBJECT_ID_CLAIM: &str = "subjectId";

/// Decode the payload segment of a bearer token into JSON.
pub fn decode_claims(token: &str) -> Result<Value> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(Error::TokenDecode(format!(
            "expected 3 segments, got {}",
            segments.len()
        )));
    }

    let payload = segments[1].trim_end_matches('=');
    if payload.is_empty() {
        return Err(Error::TokenDecode("payload segment is empty".into()));
    }

    // Issuers disagree on base64 flavor; accept either alphabet.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| Error::TokenDecode(format!("payload is not base64: {e}")))?;

    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::TokenDecode(format!("payload is not JSON: {e}")))?;
    if !claims.is_object() {
        return Err(Error::TokenDecode("payload is not a JSON object".into()));
    }
    Ok(claims)
}

/// Extract the subject identifier from a bearer token.
///
/// Numeric identifiers are accepted and rendered as their decimal string.
pub fn subject_id(token: &str) -> Result<String> {
    let claims = decode_claims(token)?;
    match claims.get(SUBJECT_ID_CLAIM) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(other) => Err(Error::TokenDecode(format!(
            "{SUBJECT_ID_CLAIM} has unexpected value {other}"
        ))),
        None => Err(Error::TokenDecode(format!(
            "{SUBJECT_ID_CLAIM} claim missing"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn extracts_subject_id() {
        let token = token_with_payload(r#"{"subjectId":"X"}"#);
        assert_eq!(subject_id(&token).unwrap(), "X");
    }

    #[test]
    fn accepts_padded_standard_alphabet() {
        // Standard alphabet with padding, as produced by btoa()
        let payload = STANDARD_NO_PAD.encode(r#"{"subjectId":"8f1c-??>","exp":1}"#);
        let token = format!("h.{payload}==.s");
        assert_eq!(subject_id(&token).unwrap(), "8f1c-??>");
    }

    #[test]
    fn numeric_subject_id_is_stringified() {
        let token = token_with_payload(r#"{"subjectId":12345}"#);
        assert_eq!(subject_id(&token).unwrap(), "12345");
    }

    #[test]
    fn empty_payload_is_decode_error() {
        assert!(matches!(subject_id("a..c"), Err(Error::TokenDecode(_))));
    }

    #[test]
    fn wrong_segment_count_is_decode_error() {
        assert!(matches!(subject_id("onlyone"), Err(Error::TokenDecode(_))));
        assert!(matches!(subject_id("a.b.c.d"), Err(Error::TokenDecode(_))));
    }

    #[test]
    fn non_base64_payload_is_decode_error() {
        assert!(matches!(subject_id("a.!!!.c"), Err(Error::TokenDecode(_))));
    }

    #[test]
    fn non_json_payload_is_decode_error() {
        let token = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(subject_id(&token), Err(Error::TokenDecode(_))));
    }

    #[test]
    fn missing_claim_is_decode_error() {
        let token = token_with_payload(r#"{"sub":"X"}"#);
        let err = subject_id(&token).unwrap_err();
        assert!(err.to_string().contains("subjectId claim missing"), "got: {err}");
    }

    #[test]
    fn decode_claims_exposes_other_fields() {
        let token = token_with_payload(r#"{"subjectId":"X","role":"share"}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims["role"], "share");
    }
}
