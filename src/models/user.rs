use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The authenticated identity carried by a session.
///
/// A `User` is never built on its own: it is always read out of a
/// [`Session`](crate::models::session::Session) or a provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The stable identifier assigned by the identity provider.
    pub id: Uuid,
    /// The user's email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Attributes supplied at sign-up (name, phone, ...).
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    /// Provider-owned attributes (sign-in provider, roles).
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    /// The timestamp when the identity was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Looks up a string attribute supplied at sign-up.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(Value::as_str)
    }
}
