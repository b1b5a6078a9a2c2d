use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identity::channel::AuthEventChannel;
use crate::models::session::Session;
use crate::models::user::User;
use crate::validation::auth::Credentials;

/// What the provider returns for a new registration.
///
/// `session` is absent when the project requires email confirmation before the
/// first sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpData {
    pub user: Option<User>,
    pub session: Option<Session>,
}

/// The remote identity service.
///
/// Implementations persist the session themselves and announce every
/// transition on [`IdentityProvider::events`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the persisted session, refreshing it first if it is about to expire.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Exchanges the persisted refresh token for a new session.
    async fn refresh_session(&self) -> Result<Option<Session>>;

    /// Asks the provider who the current access token belongs to.
    async fn get_user(&self) -> Result<Option<User>>;

    async fn sign_up(
        &self,
        credentials: &Credentials,
        attributes: Map<String, Value>,
    ) -> Result<SignUpData>;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session>;

    /// Invalidates the session remotely and forgets it locally.
    async fn sign_out(&self) -> Result<()>;

    /// The channel on which auth events are emitted.
    fn events(&self) -> &AuthEventChannel;
}
