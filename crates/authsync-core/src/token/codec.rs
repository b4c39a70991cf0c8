use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Number of dot-separated segments in a compact token (header.payload.signature)
const TOKEN_SEGMENTS: usize = 3;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed token: expected 3 segments, found {0}")]
    WrongSegmentCount(usize),

    #[error("Malformed token: payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Malformed token: payload is not a claims object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed token: timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

/// Wire shape of the claims the backend embeds in its access tokens.
#[derive(Debug, Deserialize)]
struct RawClaims {
    user_id: i64,
    iat: i64,
    exp: i64,
    jti: String,
}

/// Claims decoded from an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub unique_id: String,
}

impl TokenClaims {
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Check if the token will expire within `buffer` and should be refreshed
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now + buffer >= self.expires_at
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.time_until_expiry(now).num_minutes().max(0)
    }
}

/// Decode the claims of a compact bearer token without verifying its signature.
pub fn decode(token: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != TOKEN_SEGMENTS {
        return Err(TokenError::WrongSegmentCount(segments.len()));
    }

    // Some issuers pad their segments; the no-pad engine rejects '='
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    let raw: RawClaims = serde_json::from_slice(&bytes)?;

    Ok(TokenClaims {
        subject_id: raw.user_id,
        issued_at: timestamp(raw.iat)?,
        expires_at: timestamp(raw.exp)?,
        unique_id: raw.jti,
    })
}

/// True iff `now` is at or past the token's expiry.
pub fn is_expired(claims: &TokenClaims, now: DateTime<Utc>) -> bool {
    now >= claims.expires_at
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0).ok_or(TokenError::InvalidTimestamp(secs))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mint_token;
    use base64::engine::general_purpose::URL_SAFE;

    #[test]
    fn test_decode_extracts_claims() {
        let now = Utc::now();
        let token = mint_token(7, now + Duration::minutes(5));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.subject_id, 7);
        assert_eq!(claims.expires_at.timestamp(), (now + Duration::minutes(5)).timestamp());
        assert!(claims.issued_at <= claims.expires_at);
        assert!(!claims.unique_id.is_empty());
    }

    #[test]
    fn test_decode_accepts_padded_payload() {
        let payload = URL_SAFE.encode(br#"{"user_id":3,"iat":1700000000,"exp":1700000300,"jti":"ab"}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", payload);

        let claims = decode(&token).unwrap();
        assert_eq!(claims.subject_id, 3);
        assert_eq!(claims.unique_id, "ab");
    }

    #[test]
    fn test_decode_rejects_wrong_segment_count() {
        assert!(matches!(decode("abc"), Err(TokenError::WrongSegmentCount(1))));
        assert!(matches!(decode("a.b.c.d"), Err(TokenError::WrongSegmentCount(4))));
        assert!(matches!(decode(""), Err(TokenError::WrongSegmentCount(1))));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(decode("a.!!!.c"), Err(TokenError::Base64(_))));
    }

    #[test]
    fn test_decode_rejects_non_claims_payload() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"alice"}"#);
        let token = format!("h.{}.s", payload);
        assert!(matches!(decode(&token), Err(TokenError::Json(_))));
    }

    #[test]
    fn test_decode_rejects_out_of_range_timestamp() {
        let payload = URL_SAFE_NO_PAD.encode(
            format!(r#"{{"user_id":1,"iat":0,"exp":{},"jti":"x"}}"#, i64::MAX).as_bytes(),
        );
        let token = format!("h.{}.s", payload);
        assert!(matches!(decode(&token), Err(TokenError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = Utc::now();
        let claims = decode(&mint_token(1, now)).unwrap();
        // Expiry is second-granular; exactly at expiry counts as expired
        assert!(is_expired(&claims, claims.expires_at));
        assert!(is_expired(&claims, claims.expires_at + Duration::seconds(10)));
        assert!(!is_expired(&claims, claims.expires_at - Duration::seconds(1)));
    }

    #[test]
    fn test_needs_refresh_and_minutes_until_expiry() {
        let now = Utc::now();
        let claims = decode(&mint_token(1, now + Duration::minutes(30))).unwrap();

        assert!(!claims.needs_refresh(now, Duration::minutes(5)));
        assert!(claims.needs_refresh(now + Duration::minutes(26), Duration::minutes(5)));
        assert!(claims.minutes_until_expiry(now) >= 29);
        assert_eq!(claims.minutes_until_expiry(now + Duration::hours(2)), 0);
    }
}
