//! Claim extraction from Supabase access tokens.
//!
//! Signatures are not verified here; every token is verified again by the
//! Supabase endpoints it is sent to. The claims are only used to fill gaps when
//! the cookie principal or the in-memory session is missing a value.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// The subset of GoTrue access-token claims this crate reads
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct JwtClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub exp: Option<i64>,
    pub role: Option<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl JwtClaims {
    pub fn user_id(&self) -> Option<Uuid> {
        self.sub.as_deref().and_then(|sub| Uuid::parse_str(sub.trim()).ok())
    }

    /// Expired once `now + skew` has passed `exp`; tokens without `exp` never expire
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.exp {
            Some(exp) => (now + skew).timestamp() >= exp,
            None => false,
        }
    }

    pub fn metadata_display_name(&self) -> Option<&str> {
        self.user_metadata.get("display_name").and_then(|v| v.as_str())
    }
}

/// Decodes the payload segment of a compact JWT
pub fn decode_claims(token: &str) -> Option<JwtClaims> {
    let mut segments = token.trim().split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Builds an unsigned token carrying `claims`; used by tests across the crate
#[cfg(test)]
pub(crate) fn unsigned_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
