use std::fmt::Display;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::session::Token;

/// Media type that makes the table API return one object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Creates the HTTP client shared by every remote call.
///
/// # Arguments
///
/// * `config` - The application's configuration.
///
/// # Returns
///
/// A `Result` containing a `reqwest::Client` that sends the project's API key
/// on every request.
pub fn create_http_client(config: &Config) -> Result<reqwest::Client> {
    let invalid_key = |_| AppError::Validation("Anon key is not a valid header value".to_string());

    let mut apikey = HeaderValue::from_str(config.anon_key.as_str()).map_err(invalid_key)?;
    apikey.set_sensitive(true);

    let mut bearer =
        HeaderValue::from_str(&format!("Bearer {}", config.anon_key.as_str())).map_err(invalid_key)?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert("apikey", apikey);
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(
        "x-client-info",
        HeaderValue::from_static(concat!("parkswap/", env!("CARGO_PKG_VERSION"))),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(AppError::from)
}

/// A row filter in the table API's `column=op.value` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    column: &'static str,
    op: &'static str,
    value: String,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Display) -> Self {
        Self {
            column,
            op: "eq",
            value: value.to_string(),
        }
    }

    fn to_pair(&self) -> (&'static str, String) {
        (self.column, format!("{}.{}", self.op, self.value))
    }
}

#[derive(Deserialize, Default)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classifies a failed table API response.
pub fn rest_error(status: StatusCode, body: &str) -> AppError {
    let parsed: RestErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .clone()
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match (status, parsed.code.as_deref()) {
        (StatusCode::NOT_ACCEPTABLE, Some("PGRST116")) => AppError::NotFound,
        (StatusCode::UNAUTHORIZED, _) | (StatusCode::FORBIDDEN, _) => {
            AppError::AuthenticationRejected(message)
        }
        (StatusCode::BAD_GATEWAY, _) | (StatusCode::GATEWAY_TIMEOUT, _) => {
            AppError::NetworkUnavailable(message)
        }
        _ => AppError::Provider(message),
    }
}

/// Client for the table API (`/rest/v1`) and object storage (`/storage/v1`).
///
/// There is no retry, pagination or caching: each call is one request.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    rest_url: String,
    storage_url: String,
}

impl RestClient {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            rest_url: config.rest_url(),
            storage_url: config.object_storage_url(),
        }
    }

    fn table(&self, method: Method, token: &Token, table: &str, filters: &[Filter]) -> RequestBuilder {
        let pairs: Vec<(&str, String)> = filters.iter().map(Filter::to_pair).collect();
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .bearer_auth(token.expose())
            .query(&pairs)
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(rest_error(status, &body))
    }

    /// Reads every row matching `filters`, optionally ordered (`column.desc`).
    pub async fn select<T: DeserializeOwned>(
        &self,
        token: &Token,
        table: &str,
        filters: &[Filter],
        order: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut request = self
            .table(Method::GET, token, table, filters)
            .query(&[("select", "*")]);
        if let Some(order) = order {
            request = request.query(&[("order", order)]);
        }

        Ok(Self::send(request).await?.json().await?)
    }

    /// Reads exactly one row; zero rows is `NotFound`.
    pub async fn select_single<T: DeserializeOwned>(
        &self,
        token: &Token,
        table: &str,
        filters: &[Filter],
    ) -> Result<T> {
        let request = self
            .table(Method::GET, token, table, filters)
            .query(&[("select", "*")])
            .header(ACCEPT, SINGLE_OBJECT);

        Ok(Self::send(request).await?.json().await?)
    }

    /// Inserts one row and returns it as stored.
    pub async fn insert_single<T: DeserializeOwned, B: Serialize>(
        &self,
        token: &Token,
        table: &str,
        row: &B,
    ) -> Result<T> {
        let request = self
            .table(Method::POST, token, table, &[])
            .query(&[("select", "*")])
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(&[row]);

        Ok(Self::send(request).await?.json().await?)
    }

    /// Updates every row matching `filters` without reading them back.
    pub async fn update<B: Serialize>(
        &self,
        token: &Token,
        table: &str,
        filters: &[Filter],
        changes: &B,
    ) -> Result<()> {
        let request = self
            .table(Method::PATCH, token, table, filters)
            .header("Prefer", "return=minimal")
            .json(changes);

        Self::send(request).await?;
        Ok(())
    }

    /// Updates the single row matching `filters` and returns it.
    pub async fn update_single<T: DeserializeOwned, B: Serialize>(
        &self,
        token: &Token,
        table: &str,
        filters: &[Filter],
        changes: &B,
    ) -> Result<T> {
        let request = self
            .table(Method::PATCH, token, table, filters)
            .query(&[("select", "*")])
            .header("Prefer", "return=representation")
            .header(ACCEPT, SINGLE_OBJECT)
            .json(changes);

        Ok(Self::send(request).await?.json().await?)
    }

    /// Deletes every row matching `filters`.
    pub async fn delete(&self, token: &Token, table: &str, filters: &[Filter]) -> Result<()> {
        let request = self.table(Method::DELETE, token, table, filters);
        Self::send(request).await?;
        Ok(())
    }

    /// Uploads an object, replacing any object already at `path`.
    pub async fn upload_object(
        &self,
        token: &Token,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let request = self
            .http
            .post(format!("{}/object/{}/{}", self.storage_url, bucket, path))
            .bearer_auth(token.expose())
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);

        Self::send(request).await?;
        Ok(())
    }

    /// The public URL of an object in a public bucket.
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.storage_url, bucket, path)
    }
}
