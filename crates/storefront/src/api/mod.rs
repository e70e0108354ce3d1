//! HTTP client for the backend REST API.
//!
//! # Behavior
//!
//! - JSON in, JSON out; an empty response body parses as `null`
//! - `Authorization: Bearer <token>` when a token is set
//! - Flat query parameters via [`QueryParams`] (array values repeat the key)
//! - Single attempt per call: no retry, no timeout, no backoff
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_storefront::api::{ApiClient, MemoryTokenStore, QueryParams};
//!
//! let client = ApiClient::new("https://api.atelier.shop", Arc::new(MemoryTokenStore::default()));
//! let orders: Vec<Order> = client
//!     .get("/orders/admin", Some(&QueryParams::new().with("status", "pending")))
//!     .await?;
//! ```

mod query;
mod token;

pub use query::{ParamValue, QueryParams};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors returned by [`ApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// The response body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The token could not be persisted.
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

impl ApiError {
    /// HTTP status for `Status` errors.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error body shape the backend uses: `{"message": ...}` or `{"error": ...}`.
#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Client for the backend REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<SecretString>>,
    store: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("has_token", &self.has_token())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client rooted at `base_url`, loading the token from `store`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, store: Arc<dyn TokenStore>) -> Self {
        let token = store.load();
        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                token: RwLock::new(token),
                store,
            }),
        }
    }

    /// The base URL requests are joined onto.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Whether requests currently carry a bearer token.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replace the bearer token and persist it. `None` logs out.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::TokenStore` if the token cannot be persisted; the
    /// in-memory token is left unchanged in that case.
    pub fn set_token(&self, token: Option<SecretString>) -> Result<(), ApiError> {
        self.inner.store.save(token.as_ref())?;
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
        Ok(())
    }

    /// `GET endpoint?params`.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, params), fields(base = %self.inner.base_url))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: Option<&QueryParams>,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, endpoint, params)).await
    }

    /// `POST endpoint` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, body), fields(base = %self.inner.base_url))]
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, endpoint, None).json(body))
            .await
    }

    /// `PUT endpoint` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, body), fields(base = %self.inner.base_url))]
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::PUT, endpoint, None).json(body))
            .await
    }

    /// `PATCH endpoint` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self, body), fields(base = %self.inner.base_url))]
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::PATCH, endpoint, None).json(body))
            .await
    }

    /// `DELETE endpoint`.
    ///
    /// # Errors
    ///
    /// See [`ApiError`].
    #[instrument(skip(self), fields(base = %self.inner.base_url))]
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::DELETE, endpoint, None)).await
    }

    /// Full URL for an endpoint, with the query string appended when non-empty.
    fn url(&self, endpoint: &str, params: Option<&QueryParams>) -> String {
        let mut url = format!(
            "{}/{}",
            self.inner.base_url,
            endpoint.trim_start_matches('/')
        );
        if let Some(query) = params.map(QueryParams::to_query_string)
            && !query.is_empty()
        {
            url.push('?');
            url.push_str(&query);
        }
        url
    }

    fn request(&self, method: Method, endpoint: &str, params: Option<&QueryParams>) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, self.url(endpoint, params))
            .header(reqwest::header::ACCEPT, "application/json");

        let token = self
            .inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match token.as_ref() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error))
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            debug!(status = %status, message = %message, "Backend API returned error status");
            return Err(ApiError::Status { status, message });
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        Ok(serde_json::from_str(body)?)
    }
}
