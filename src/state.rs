use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::config::Config;
use crate::db::{RestClient, create_http_client};
use crate::error::{AppError, Result};
use crate::identity::channel::Subscription;
use crate::identity::gotrue::GoTrueClient;
use crate::identity::provider::IdentityProvider;
use crate::models::event::{AuthEvent, AuthEventKind};
use crate::models::session::Session;
use crate::models::user::User;
use crate::services::auth::AuthGateway;
use crate::storage::{FileStorage, KeyValueStorage};

/// What screens and the navigation gate read: who is signed in, and whether
/// start-up restoration is still running.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub session: Option<Session>,
    pub loading: bool,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

struct StoreInner {
    state: watch::Sender<SessionSnapshot>,
    loading_resolved: AtomicBool,
}

/// The single owner of the in-process session.
///
/// Cloning yields another handle to the same store. Every mutation is
/// synchronous; observers are woken only when the snapshot actually changes.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Creates an empty store with `loading` set.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionSnapshot::initial());
        Self {
            inner: Arc::new(StoreInner {
                state,
                loading_resolved: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the current snapshot.
    pub fn current(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to snapshot changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    /// Applies a provider event.
    ///
    /// `SIGNED_OUT` always clears, whatever session the event carries; every
    /// other kind replaces the stored session with the event's.
    pub fn apply_event(&self, event: &AuthEvent) {
        let next = match &event.kind {
            AuthEventKind::SignedOut => {
                tracing::info!("👋 Signed out, clearing local session");
                None
            }
            AuthEventKind::SignedIn => {
                tracing::info!("🔐 Signed in");
                event.session.clone()
            }
            AuthEventKind::TokenRefreshed => {
                tracing::debug!("🔄 Token refreshed");
                event.session.clone()
            }
            AuthEventKind::UserUpdated => {
                tracing::info!("👤 User data updated");
                event.session.clone()
            }
            AuthEventKind::Other(name) => {
                tracing::debug!("Auth event {}", name);
                event.session.clone()
            }
        };

        self.replace_session(next);
    }

    /// Drops the session and user.
    pub fn clear(&self) {
        self.replace_session(None);
    }

    /// Replaces the session, deriving the user from it. Returns whether anything changed.
    fn replace_session(&self, session: Option<Session>) -> bool {
        self.inner.state.send_if_modified(|snapshot| {
            if snapshot.session == session {
                return false;
            }
            snapshot.user = session.as_ref().map(|s| s.user.clone());
            snapshot.session = session;
            true
        })
    }

    /// Ends the loading phase. Only the first call has an effect.
    pub fn finish_loading(&self) -> bool {
        if self.inner.loading_resolved.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.state.send_modify(|snapshot| snapshot.loading = false);
        true
    }

    /// Returns the signed-in user or `NotAuthenticated`.
    pub fn require_user(&self) -> Result<User> {
        self.inner
            .state
            .borrow()
            .user
            .clone()
            .ok_or(AppError::NotAuthenticated)
    }

    /// Returns the current session or `NotAuthenticated`.
    pub fn require_session(&self) -> Result<Session> {
        self.inner
            .state
            .borrow()
            .session
            .clone()
            .ok_or(AppError::NotAuthenticated)
    }

    /// Subscribes to the gateway, restores the persisted session once and ends
    /// the loading phase.
    ///
    /// Call once per process. The returned guard owns the subscription; drop it
    /// (or call [`SessionGuard::teardown`]) when the store goes away.
    pub async fn initialize(&self, gateway: &AuthGateway) -> SessionGuard {
        let store = self.clone();
        let subscription = gateway.subscribe(move |event| store.apply_event(&event));

        let restored = gateway.restore_session().await;
        match &restored {
            Some(session) => tracing::info!("✅ Session restored for user: {}", session.user.id),
            None => tracing::info!("No session to restore"),
        }

        self.replace_session(restored);
        self.finish_loading();

        SessionGuard {
            subscription: Some(subscription),
        }
    }
}

/// Keeps the provider subscription alive for as long as the store is in use.
pub struct SessionGuard {
    subscription: Option<Subscription>,
}

impl SessionGuard {
    /// Releases the subscription now.
    pub fn teardown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            let id = subscription.id();
            match subscription.unsubscribe() {
                Ok(()) => tracing::info!("🧹 Auth subscription {} released", id),
                Err(e) => tracing::warn!("⚠️ Failed to release auth subscription {}: {}", id, e),
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// The application's state, handed to every screen.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The session store.
    pub store: SessionStore,
    /// The only way to reach the identity provider.
    pub auth: AuthGateway,
    /// The table and object storage client.
    pub rest: RestClient,
}

impl AppState {
    /// Creates a new `AppState` backed by the hosted services and a storage file.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(config: &Config) -> Result<Self> {
        let storage = FileStorage::open(&config.storage_path);
        tracing::info!("✅ Local storage at {}", storage.path().display());

        Self::with_storage(config, Arc::new(storage))
    }

    /// Creates an `AppState` that talks to the hosted services but persists into `storage`.
    pub fn with_storage(config: &Config, storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let http = create_http_client(config)?;
        tracing::info!("✅ HTTP client initialized for {}", config.supabase_url);

        let provider: Arc<dyn IdentityProvider> =
            Arc::new(GoTrueClient::new(config, http.clone(), storage.clone()));

        Ok(Self::assemble(config, provider, storage, http))
    }

    /// Creates an `AppState` around an arbitrary identity provider.
    pub fn with_provider(
        config: &Config,
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self> {
        let http = create_http_client(config)?;
        Ok(Self::assemble(config, provider, storage, http))
    }

    fn assemble(
        config: &Config,
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn KeyValueStorage>,
        http: reqwest::Client,
    ) -> Self {
        let store = SessionStore::new();
        let auth = AuthGateway::new(provider, storage, store.clone());
        let rest = RestClient::new(config, http);

        AppState {
            config: config.clone(),
            store,
            auth,
            rest,
        }
    }
}
