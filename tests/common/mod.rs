#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use uuid::Uuid;

use parkswap::config::Config;
use parkswap::error::{AppError, Result};
use parkswap::identity::channel::AuthEventChannel;
use parkswap::identity::provider::{IdentityProvider, SignUpData};
use parkswap::models::event::AuthEvent;
use parkswap::models::session::{Session, Token};
use parkswap::models::user::User;
use parkswap::state::{SessionSnapshot, SessionStore};
use parkswap::validation::auth::Credentials;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub fn test_config(base_url: &str) -> Config {
    Config::new(base_url, "test-anon-key").unwrap()
}

pub fn user(email: &str) -> User {
    User {
        id: Uuid::new_v4(),
        email: Some(email.to_string()),
        user_metadata: Map::new(),
        app_metadata: Map::new(),
        created_at: Some(Utc::now()),
    }
}

pub fn session_for(user: User) -> Session {
    Session {
        access_token: Token::new(format!("access-{}", Uuid::new_v4())),
        refresh_token: Token::new(format!("refresh-{}", Uuid::new_v4())),
        token_type: "bearer".to_string(),
        expires_at: (Utc::now() + chrono::Duration::hours(1)).trunc_subsecs(0),
        user,
    }
}

pub fn session(email: &str) -> Session {
    session_for(user(email))
}

/// Waits until the store satisfies `predicate`, failing the test after two seconds.
pub async fn wait_for_store(
    store: &SessionStore,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = store.watch();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for the session store")
        .expect("session store dropped");
    snapshot.clone()
}

/// An in-memory identity provider with a single known account.
pub struct MockProvider {
    events: AuthEventChannel,
    stored: Mutex<Option<Session>>,
    password: String,
    pub fail_restore: bool,
    pub fail_sign_out: bool,
    pub sign_in_calls: Mutex<u32>,
}

impl MockProvider {
    pub fn new(password: &str) -> Self {
        Self {
            events: AuthEventChannel::new(),
            stored: Mutex::new(None),
            password: password.to_string(),
            fail_restore: false,
            fail_sign_out: false,
            sign_in_calls: Mutex::new(0),
        }
    }

    pub fn with_session(self, session: Session) -> Self {
        *self.stored.lock().unwrap() = Some(session);
        self
    }

    pub fn stored(&self) -> Option<Session> {
        self.stored.lock().unwrap().clone()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn get_session(&self) -> Result<Option<Session>> {
        if self.fail_restore {
            return Err(AppError::NetworkUnavailable("connection refused".into()));
        }
        Ok(self.stored())
    }

    async fn refresh_session(&self) -> Result<Option<Session>> {
        Ok(self.stored())
    }

    async fn get_user(&self) -> Result<Option<User>> {
        Ok(self.stored().map(|s| s.user))
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        attributes: Map<String, Value>,
    ) -> Result<SignUpData> {
        let mut user = user(&credentials.email);
        user.user_metadata = attributes;
        Ok(SignUpData {
            user: Some(user),
            session: None,
        })
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        *self.sign_in_calls.lock().unwrap() += 1;

        if credentials.password != self.password {
            return Err(AppError::AuthenticationRejected(
                "Invalid login credentials".into(),
            ));
        }

        let session = session(&credentials.email);
        *self.stored.lock().unwrap() = Some(session.clone());
        self.events.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.fail_sign_out {
            return Err(AppError::NetworkUnavailable("connection reset".into()));
        }
        *self.stored.lock().unwrap() = None;
        self.events.emit(AuthEvent::signed_out());
        Ok(())
    }

    fn events(&self) -> &AuthEventChannel {
        &self.events
    }
}
