use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::identity::channel::Subscription;
use crate::identity::provider::{IdentityProvider, SignUpData};
use crate::models::event::AuthEvent;
use crate::models::session::Session;
use crate::models::user::User;
use crate::state::SessionStore;
use crate::storage::{self, AUTH_KEY_MARKERS, KeyValueStorage};
use crate::validation::auth::Credentials;

/// The only component allowed to call the identity provider.
///
/// Every operation reports failure through its `Result`; nothing is retried.
#[derive(Clone)]
pub struct AuthGateway {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn KeyValueStorage>,
    store: SessionStore,
}

impl AuthGateway {
    /// Creates a new `AuthGateway`.
    ///
    /// # Arguments
    ///
    /// * `provider` - The remote identity service.
    /// * `storage` - The local storage purged on sign-out.
    /// * `store` - The session store cleared on sign-out.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn KeyValueStorage>,
        store: SessionStore,
    ) -> Self {
        Self {
            provider,
            storage,
            store,
        }
    }

    /// Fetches the persisted session, if any.
    ///
    /// Never fails: any error is logged and reported as "no session".
    pub async fn restore_session(&self) -> Option<Session> {
        match self.provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("❌ Failed to restore session: {}", e);
                None
            }
        }
    }

    /// Registers a new identity.
    ///
    /// # Arguments
    ///
    /// * `email` - Required.
    /// * `password` - Required.
    /// * `attributes` - Free-form profile data attached to the identity.
    ///
    /// # Returns
    ///
    /// A `Result` containing the new user and, when no confirmation is
    /// required, its session.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: Map<String, Value>,
    ) -> Result<SignUpData> {
        tracing::info!("📝 Sign-up attempt");
        let credentials = Credentials::new(email, password)?;

        self.provider
            .sign_up(&credentials, attributes)
            .await
            .inspect(|data| {
                if let Some(user) = &data.user {
                    tracing::info!("✅ Sign-up succeeded: {}", user.id);
                }
            })
            .inspect_err(|e| tracing::error!("❌ Sign-up failed: {}", e))
    }

    /// Exchanges credentials for a session.
    ///
    /// The store is updated by the provider's `SIGNED_IN` event, not by this
    /// return value.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        tracing::info!("🔐 Sign-in attempt");
        let credentials = Credentials::new(email, password)?;

        self.provider
            .sign_in_with_password(&credentials)
            .await
            .inspect(|session| tracing::info!("✅ Sign-in succeeded: {}", session.user.id))
            .inspect_err(|e| tracing::error!("❌ Sign-in failed: {}", e))
    }

    /// Signs out in three independent steps.
    ///
    /// 1. Invalidate the remote session; its error is the only one returned.
    /// 2. Clear the session store.
    /// 3. Purge auth keys from local storage; failures are only logged.
    pub async fn sign_out(&self) -> Result<()> {
        tracing::info!("👋 Sign-out started");

        let remote = self.provider.sign_out().await;
        match &remote {
            Ok(()) => tracing::info!("✅ Remote session invalidated"),
            Err(e) => tracing::error!("❌ Remote sign-out failed: {}", e),
        }

        self.store.clear();
        tracing::info!("✅ Local session cleared");

        match storage::purge_matching(self.storage.as_ref(), &AUTH_KEY_MARKERS).await {
            Ok(removed) => tracing::debug!("🧹 {} persisted auth keys removed", removed),
            Err(e) => tracing::error!("❌ Failed to purge local storage: {}", e),
        }

        remote
    }

    /// Registers `handler` for every auth event, in emission order.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(AuthEvent) + Send + 'static,
    {
        self.provider.events().subscribe(handler)
    }

    /// Asks the provider who the current token belongs to.
    pub async fn current_user(&self) -> Result<Option<User>> {
        self.provider
            .get_user()
            .await
            .inspect_err(|e| tracing::error!("❌ Failed to fetch current user: {}", e))
    }

    /// Starts a task that keeps the persisted session fresh.
    ///
    /// Every `tick` the provider is asked for the session, which refreshes it
    /// when it is close to expiry. The task ends when `cancel` fires.
    pub fn spawn_auto_refresh(&self, tick: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let provider = Arc::clone(&self.provider);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("🛑 Session auto-refresh stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = provider.get_session().await {
                            tracing::warn!("⚠️ Session auto-refresh failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}
