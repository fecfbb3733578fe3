//! Unverified inspection of bearer tokens.
//!
//! Claims decoded here drive refresh timing only. The signature is never
//! checked, so nothing in this module may be used to authorize an action;
//! the server re-validates every privileged call.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    #[error("token does not have three dot-separated segments")]
    Malformed,
    #[error("payload is not valid base64: {0}")]
    Base64(String),
    #[error("payload is not a JSON object: {0}")]
    Json(String),
    #[error("payload has no numeric exp claim")]
    MissingExpiry,
}

/// Claims carried in the token payload. Only `exp` is required; identity
/// claims are informational and kept leniently.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    pub exp: i64,
    pub iat: Option<i64>,
    pub sub: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub extra: Map<String, Value>,
}

/// Decode the payload segment of a JWT-shaped token.
pub fn decode(token: &str) -> Result<TokenClaims, TokenDecodeError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 || parts[1].is_empty() {
        return Err(TokenDecodeError::Malformed);
    }

    let bytes = base64_decode(parts[1])?;

    let json: Value =
        serde_json::from_slice(&bytes).map_err(|e| TokenDecodeError::Json(e.to_string()))?;
    let Value::Object(mut map) = json else {
        return Err(TokenDecodeError::Json("payload is not an object".to_string()));
    };

    let exp = map
        .remove("exp")
        .and_then(|v| v.as_i64())
        .ok_or(TokenDecodeError::MissingExpiry)?;

    let text_claim = |map: &mut Map<String, Value>, key: &str| -> Option<String> {
        match map.remove(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    };

    let iat = map.remove("iat").and_then(|v| v.as_i64());
    let sub = text_claim(&mut map, "sub");
    let email = text_claim(&mut map, "email");
    let role = text_claim(&mut map, "role");

    Ok(TokenClaims {
        exp,
        iat,
        sub,
        email,
        role,
        extra: map,
    })
}

/// True if the token cannot be decoded or `exp <= now`.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    match decode(token) {
        Ok(claims) => claims.exp <= now.timestamp(),
        Err(e) => {
            debug!("Treating undecodable token as expired: {}", e);
            true
        }
    }
}

/// Remaining lifetime, `exp * 1000 - now_ms`. Negative once expired.
/// `None` when the token cannot be decoded; callers treat that as expired.
pub fn time_until_expiry(token: &str, now: DateTime<Utc>) -> Option<Duration> {
    let claims = decode(token).ok()?;
    Some(Duration::milliseconds(
        claims.exp.saturating_mul(1000) - now.timestamp_millis(),
    ))
}

/// True while the token is still valid but has less than `threshold` left.
/// Expired and undecodable tokens are not candidates.
pub fn needs_proactive_refresh(token: &str, threshold: Duration, now: DateTime<Utc>) -> bool {
    match time_until_expiry(token, now) {
        Some(remaining) => remaining > Duration::zero() && remaining < threshold,
        None => false,
    }
}

// JWT uses base64url, but tokens produced by other encoders may use the
// standard alphabet or keep padding.
fn base64_decode(input: &str) -> Result<Vec<u8>, TokenDecodeError> {
    let trimmed = input.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| TokenDecodeError::Base64(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::test_tokens::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_exp() {
        // Header: {"alg":"HS256","typ":"JWT"}
        // Payload: {"exp":1234567890,"sub":"test"}
        let token = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJleHAiOjEyMzQ1Njc4OTAsInN1YiI6InRlc3QifQ.signature";

        let claims = decode(token).unwrap();
        assert_eq!(claims.exp, 1234567890);
        assert_eq!(claims.sub.as_deref(), Some("test"));
    }

    #[test]
    fn test_decode_keeps_unknown_claims() {
        let token = token_with_payload(&json!({
            "exp": 10, "sub": 42, "role": "ADMIN", "tenant": "eu", "id": "x-1"
        }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.role.as_deref(), Some("ADMIN"));
        assert_eq!(claims.extra.get("tenant"), Some(&json!("eu")));
        assert_eq!(claims.extra.get("id"), Some(&json!("x-1")));
    }

    #[test]
    fn test_token_ten_minutes_out_is_not_expiring() {
        let now = Utc::now();
        let token = token_expiring_in(Duration::minutes(10), "a");
        assert!(!is_expired(&token, now));
        assert!(!needs_proactive_refresh(&token, Duration::minutes(5), now));
    }

    #[test]
    fn test_token_one_minute_out_is_expiring() {
        let now = Utc::now();
        let token = token_expiring_in(Duration::minutes(1), "a");
        assert!(!is_expired(&token, now));
        assert!(needs_proactive_refresh(&token, Duration::minutes(5), now));
    }

    #[test]
    fn test_proactive_window_excludes_both_ends() {
        let now = Utc::now();
        let at_threshold = token_with_payload(&json!({ "exp": now.timestamp() + 300 }));
        let threshold = time_until_expiry(&at_threshold, now).unwrap();
        assert!(!needs_proactive_refresh(&at_threshold, threshold, now));
        assert!(needs_proactive_refresh(&at_threshold, threshold + Duration::milliseconds(1), now));

        let expired = token_expiring_in(Duration::minutes(-1), "a");
        assert!(!needs_proactive_refresh(&expired, Duration::minutes(5), now));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let token = token_with_payload(&json!({ "exp": now.timestamp() }));
        assert!(is_expired(&token, now));
    }

    #[test]
    fn test_time_until_expiry_may_be_negative() {
        let now = Utc::now();
        let token = token_with_payload(&json!({ "exp": now.timestamp() - 30 }));
        let remaining = time_until_expiry(&token, now).unwrap();
        assert!(remaining < Duration::zero());
        assert!(remaining >= Duration::seconds(-31));
    }

    #[test]
    fn test_malformed_tokens_report_expired() {
        let now = Utc::now();
        for token in ["", "abc", "a.b", "a.!!!.c", "a.bm90IGpzb24.c", "a.W10.c"] {
            assert!(is_expired(token, now), "{token:?} should be expired");
            assert!(time_until_expiry(token, now).is_none());
            assert!(!needs_proactive_refresh(token, Duration::minutes(5), now));
        }
    }

    #[test]
    fn test_missing_exp_is_a_decode_error() {
        let token = token_with_payload(&json!({ "sub": "1" }));
        assert_eq!(decode(&token), Err(TokenDecodeError::MissingExpiry));
    }

    #[test]
    fn test_standard_alphabet_with_padding_is_accepted() {
        let body = base64::engine::general_purpose::STANDARD.encode(r#"{"exp":99}"#);
        let token = format!("h.{}.s", body);
        assert_eq!(decode(&token).unwrap().exp, 99);
    }
}
