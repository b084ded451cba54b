//! HTTP adapter over the backend REST API.
//!
//! Attaches the bearer token, refuses to send authenticated requests without
//! a live token, and normalizes responses into `Result<T, ClientError>`.

pub mod auth;
pub mod comments;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod users;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::auth::Credentials;
use crate::config::Config;
use crate::error::{server_error, ClientError};

pub use auth::LoginResponse;
pub use posts::LikeResponse;
pub use users::FollowResponse;

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                tracing::error!(?e, "failed to build HTTP client");
                ClientError::Network(e.to_string())
            })?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A request that carries no credentials (login, register).
    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// A request with `Authorization: Bearer <token>`. Fails before any I/O
    /// when there is no live token.
    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let bearer = self.credentials.bearer()?;
        Ok(self
            .http
            .request(method, self.url(path))
            .header(reqwest::header::AUTHORIZATION, bearer))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = execute(request).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_unit(&self, request: RequestBuilder) -> Result<(), ClientError> {
        execute(request).await?;
        Ok(())
    }
}

/// Send and map non-2xx statuses onto the error taxonomy.
async fn execute(request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    if status == StatusCode::UNAUTHORIZED {
        tracing::debug!(%status, %url, "request rejected as unauthenticated");
        return Err(ClientError::Unauthenticated);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(%status, %url, "request failed");
    Err(server_error(status.as_u16(), &body))
}
