use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::models::user::User;

/// Opaque token material issued by the identity provider.
///
/// ⚠️ Never logged: `Debug` prints a placeholder and the buffer is wiped on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token, for building an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for Token {}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Represents one authenticated period.
///
/// The core never inspects the tokens; it only carries them to request headers
/// and compares expiry. A refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Short-lived bearer token.
    pub access_token: Token,
    /// Long-lived token exchanged for a new session.
    pub refresh_token: Token,
    /// Usually `bearer`.
    pub token_type: String,
    /// The timestamp when the access token stops being accepted.
    ///
    /// Persisted in whole seconds, so it is always built without a fractional part.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
    /// The identity this session belongs to.
    pub user: User,
}

impl Session {
    /// Returns true if the access token expires within `margin` from now.
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

/// Reads the `exp` claim out of a JWT without verifying it.
///
/// Used only as a last resort when the provider omits both `expires_at` and
/// `expires_in`.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}
