//! Unverified access-token claims, for status display only.
//!
//! The backend issues JWTs. The client never trusts these claims for
//! authorization; it only reads `exp` to report when the access credential
//! lapses.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Claims read from an access credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessClaims {
    /// Expiry as a Unix timestamp.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Subject user ID as issued by the backend.
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl AccessClaims {
    /// Decode the payload segment of a JWT without verifying it. Returns
    /// `None` for anything that is not a three-segment JWT with a JSON
    /// payload.
    pub fn decode_unverified(token: &str) -> Option<Self> {
        let mut segments = token.split('.');
        let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
        if segments.next().is_some() {
            return None;
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Expiry as a UTC timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// True when the expiry is known and at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }
}
