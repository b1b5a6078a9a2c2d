use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use zeroize::Zeroizing;

/// Default location of the persisted key-value storage file.
const DEFAULT_STORAGE_PATH: &str = ".parkswap/storage.json";

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The base URL of the Supabase project.
    pub supabase_url: Url,
    /// The anonymous API key sent with every request.
    pub anon_key: Zeroizing<String>,
    /// Where the persisted key-value storage lives.
    pub storage_path: PathBuf,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
    /// A stored session expiring within this window is refreshed before use.
    pub refresh_margin: chrono::Duration,
    /// How often the background task checks whether the session needs a refresh.
    pub auto_refresh_tick: Duration,
}

impl Config {
    /// Creates a `Config` for the given project with default tuning.
    ///
    /// # Arguments
    ///
    /// * `supabase_url` - The base URL of the Supabase project.
    /// * `anon_key` - The project's anonymous API key.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn new(supabase_url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let supabase_url = Url::parse(supabase_url)
            .with_context(|| format!("Invalid SUPABASE_URL: {}", supabase_url))?;

        Ok(Self {
            supabase_url,
            anon_key: Zeroizing::new(anon_key.into()),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            request_timeout: Duration::from_secs(10),
            refresh_margin: chrono::Duration::seconds(90),
            auto_refresh_tick: Duration::from_secs(30),
        })
    }

    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let url = env::var("SUPABASE_URL").context("SUPABASE_URL must be set")?;
        let anon_key = Zeroizing::new(
            env::var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY must be set")?,
        );

        if anon_key.trim().is_empty() {
            anyhow::bail!("SUPABASE_ANON_KEY must not be empty");
        }

        let mut config = Self::new(&url, anon_key.as_str())?;

        if let Ok(path) = env::var("PARKSWAP_STORAGE_PATH") {
            config.storage_path = PathBuf::from(path);
        }

        config.request_timeout = Duration::from_secs(
            env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid HTTP_TIMEOUT_SECS")?,
        );
        config.refresh_margin = chrono::Duration::seconds(
            env::var("SESSION_REFRESH_MARGIN_SECS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .context("Invalid SESSION_REFRESH_MARGIN_SECS")?,
        );
        config.auto_refresh_tick = Duration::from_secs(
            env::var("AUTO_REFRESH_TICK_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid AUTO_REFRESH_TICK_SECS")?,
        );

        if config.auto_refresh_tick.is_zero() {
            anyhow::bail!("AUTO_REFRESH_TICK_SECS must be greater than zero");
        }

        Ok(config)
    }

    /// The project reference: the first label of the project host.
    pub fn project_ref(&self) -> &str {
        self.supabase_url
            .host_str()
            .and_then(|host| host.split('.').next())
            .unwrap_or("local")
    }

    /// The storage key under which the identity provider persists the session.
    pub fn session_storage_key(&self) -> String {
        format!("sb-{}-auth-token", self.project_ref())
    }

    /// Base URL of the auth API.
    pub fn auth_url(&self) -> String {
        self.endpoint("auth/v1")
    }

    /// Base URL of the table API.
    pub fn rest_url(&self) -> String {
        self.endpoint("rest/v1")
    }

    /// Base URL of the object storage API.
    pub fn object_storage_url(&self) -> String {
        self.endpoint("storage/v1")
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{}", self.supabase_url.as_str().trim_end_matches('/'), suffix)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("supabase_url", &self.supabase_url.as_str())
            .field("anon_key", &"<redacted>")
            .field("storage_path", &self.storage_path)
            .field("request_timeout", &self.request_timeout)
            .field("refresh_margin", &self.refresh_margin)
            .field("auto_refresh_tick", &self.auto_refresh_tick)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_uses_first_host_label() {
        let config = Config::new("https://abcdefgh.supabase.co", "anon").unwrap();
        assert_eq!(config.project_ref(), "abcdefgh");
        assert_eq!(config.session_storage_key(), "sb-abcdefgh-auth-token");
    }

    #[test]
    fn endpoints_do_not_double_slash() {
        let config = Config::new("http://127.0.0.1:54321/", "anon").unwrap();
        assert_eq!(config.auth_url(), "http://127.0.0.1:54321/auth/v1");
        assert_eq!(config.rest_url(), "http://127.0.0.1:54321/rest/v1");
        assert_eq!(config.project_ref(), "127");
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(Config::new("not a url", "anon").is_err());
    }
}
