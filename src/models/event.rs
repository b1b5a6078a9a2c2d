use chrono::{DateTime, Utc};

use crate::models::session::Session;

/// The kind of session transition reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    /// Any event this client does not model, kept under its wire name.
    Other(String),
}

impl AuthEventKind {
    /// The provider's wire name for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for AuthEventKind {
    fn from(name: &str) -> Self {
        match name {
            "SIGNED_IN" => Self::SignedIn,
            "SIGNED_OUT" => Self::SignedOut,
            "TOKEN_REFRESHED" => Self::TokenRefreshed,
            "USER_UPDATED" => Self::UserUpdated,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl std::fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session transition emitted by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    /// The session as the provider sees it after the transition.
    pub session: Option<Session>,
    pub at: DateTime<Utc>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, session: Option<Session>) -> Self {
        Self {
            kind,
            session,
            at: Utc::now(),
        }
    }

    pub fn signed_in(session: Session) -> Self {
        Self::new(AuthEventKind::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self::new(AuthEventKind::TokenRefreshed, Some(session))
    }
}
