//! HTTP client for the hosted auth API (GoTrue).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::identity::channel::AuthEventChannel;
use crate::identity::provider::{IdentityProvider, SignUpData};
use crate::models::event::AuthEvent;
use crate::models::session::{Session, Token, jwt_expiry};
use crate::models::user::User;
use crate::storage::KeyValueStorage;
use crate::validation::auth::Credentials;

/// A successful token grant as returned by the auth API.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Token,
    refresh_token: Token,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            })
            .or_else(|| jwt_expiry(self.access_token.expose()))
            .unwrap_or_else(Utc::now)
            .trunc_subsecs(0);

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// The error shapes the auth API uses across versions.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
            .or(self.error.as_deref())
    }
}

/// Classifies a failed auth API response.
pub fn auth_error(status: StatusCode, body: &str) -> AppError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    let rejected_grant = parsed.error.as_deref() == Some("invalid_grant")
        || parsed.error_code.as_deref() == Some("invalid_credentials");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::AuthenticationRejected(message)
        }
        StatusCode::BAD_REQUEST if rejected_grant => AppError::AuthenticationRejected(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            AppError::NetworkUnavailable(message)
        }
        _ => AppError::Provider(message),
    }
}

async fn failure(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    auth_error(status, &body)
}

/// Talks to `<project>/auth/v1` and keeps the session in local storage.
pub struct GoTrueClient {
    http: reqwest::Client,
    auth_url: String,
    storage: Arc<dyn KeyValueStorage>,
    storage_key: String,
    refresh_margin: chrono::Duration,
    events: AuthEventChannel,
    refresh_lock: Mutex<()>,
}

impl GoTrueClient {
    /// Creates a new `GoTrueClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    /// * `http` - A client carrying the project's API key headers.
    /// * `storage` - Where the session is persisted.
    pub fn new(config: &Config, http: reqwest::Client, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            http,
            auth_url: config.auth_url(),
            storage,
            storage_key: config.session_storage_key(),
            refresh_margin: config.refresh_margin,
            events: AuthEventChannel::new(),
            refresh_lock: Mutex::new(()),
        }
    }

    async fn load_session(&self) -> Result<Option<Session>> {
        let Some(raw) = self.storage.get_item(&self.storage_key).await? else {
            return Ok(None);
        };

        match sonic_rs::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("⚠️ Discarding unreadable stored session: {}", e);
                self.storage.remove_item(&self.storage_key).await?;
                Ok(None)
            }
        }
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let raw = sonic_rs::to_string(session)
            .map_err(|e| AppError::StorageAccessFailed(format!("Session serialization failed: {}", e)))?;
        self.storage.set_item(&self.storage_key, &raw).await
    }

    async fn remove_session(&self) -> Result<()> {
        self.storage.remove_item(&self.storage_key).await
    }

    async fn grant(&self, grant_type: &str, body: Value) -> Result<Session> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response).await);
        }

        Ok(response.json::<TokenResponse>().await?.into_session())
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.load_session().await? else {
            return Ok(None);
        };

        if !session.expires_within(self.refresh_margin) {
            return Ok(Some(session));
        }

        tracing::debug!("⏳ Stored session expires at {}, refreshing", session.expires_at);
        self.refresh_session().await
    }

    async fn refresh_session(&self) -> Result<Option<Session>> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.load_session().await? else {
            return Ok(None);
        };

        let refreshed = self
            .grant(
                "refresh_token",
                json!({ "refresh_token": current.refresh_token.expose() }),
            )
            .await;

        match refreshed {
            Ok(session) => {
                let still_current = self
                    .load_session()
                    .await?
                    .is_some_and(|stored| stored.refresh_token == current.refresh_token);
                if !still_current {
                    tracing::info!("🚫 Session ended while refreshing, discarding new tokens");
                    return Ok(None);
                }

                self.save_session(&session).await?;
                tracing::info!("🔄 Session refreshed for user: {}", session.user.id);
                self.events.emit(AuthEvent::token_refreshed(session.clone()));
                Ok(Some(session))
            }
            Err(AppError::AuthenticationRejected(msg)) => {
                tracing::warn!("❌ Refresh token rejected, dropping session: {}", msg);
                self.remove_session().await?;
                self.events.emit(AuthEvent::signed_out());
                Err(AppError::AuthenticationRejected(msg))
            }
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self) -> Result<Option<User>> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        let response = self
            .http
            .get(format!("{}/user", self.auth_url))
            .bearer_auth(session.access_token.expose())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json::<User>().await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!("Access token not accepted by /user");
                Ok(None)
            }
            _ => Err(failure(response).await),
        }
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        attributes: Map<String, Value>,
    ) -> Result<SignUpData> {
        tracing::debug!("📝 Registering: {}", credentials.email);

        let response = self
            .http
            .post(format!("{}/signup", self.auth_url))
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
                "data": attributes,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failure(response).await);
        }

        let body: Value = response.json().await?;

        if body.get("access_token").is_some() {
            let session = serde_json::from_value::<TokenResponse>(body)
                .map_err(|e| AppError::Provider(format!("Malformed sign-up response: {}", e)))?
                .into_session();
            self.save_session(&session).await?;
            tracing::info!("✅ Registered and signed in: {}", session.user.id);
            self.events.emit(AuthEvent::signed_in(session.clone()));

            return Ok(SignUpData {
                user: Some(session.user.clone()),
                session: Some(session),
            });
        }

        let user = serde_json::from_value::<User>(body)
            .map_err(|e| AppError::Provider(format!("Malformed sign-up response: {}", e)))?;
        tracing::info!("✅ Registered, awaiting confirmation: {}", user.id);

        Ok(SignUpData {
            user: Some(user),
            session: None,
        })
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session> {
        tracing::debug!("🔐 Signing in: {}", credentials.email);

        let session = self
            .grant(
                "password",
                json!({
                    "email": credentials.email,
                    "password": credentials.password,
                }),
            )
            .await?;

        self.save_session(&session).await?;
        tracing::info!("✅ Signed in: {}", session.user.id);
        self.events.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        // An in-flight refresh must land before the session is dropped.
        let _guard = self.refresh_lock.lock().await;

        if let Some(session) = self.load_session().await? {
            let response = self
                .http
                .post(format!("{}/logout", self.auth_url))
                .query(&[("scope", "global")])
                .bearer_auth(session.access_token.expose())
                .send()
                .await?;

            match response.status() {
                status if status.is_success() => {}
                // The session is already gone upstream; forget it here too.
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                    tracing::debug!("Session already invalid upstream");
                }
                _ => return Err(failure(response).await),
            }
        }

        if let Err(e) = self.remove_session().await {
            tracing::error!("❌ Failed to remove stored session: {}", e);
        }

        tracing::info!("👋 Signed out");
        self.events.emit(AuthEvent::signed_out());
        Ok(())
    }

    fn events(&self) -> &AuthEventChannel {
        &self.events
    }
}
