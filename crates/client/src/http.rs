//! Authenticated HTTP transport.
//!
//! Every API call goes through [`ApiClient::execute`], which attaches the
//! bearer token and a request ID, and applies the single retry rule:
//!
//! > On HTTP 401, refresh the session once and replay the request once.
//! > A 401 on the replay, or a failed refresh, is final.
//!
//! There is no other retry, backoff or deduplication.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::{AuthApi, SessionContext};

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the `reqwest` client shared by the API and auth calls.
///
/// # Errors
///
/// Returns `ClientError::Http` if the TLS backend cannot be initialized.
pub fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!("crumb/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Client for the bakery REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base: Url,
    session: SessionContext,
}

impl ApiClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base: Url, session: SessionContext) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                http,
                base,
                session,
            }),
        }
    }

    /// Build the HTTP client, mount the session from `storage` and wrap both.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Http` if the HTTP client cannot be built.
    pub async fn connect(
        config: &ClientConfig,
        storage: Arc<dyn crate::storage::KeyValueStore>,
    ) -> Result<Self> {
        let http = build_http_client(config)?;
        let auth = AuthApi::new(http.clone(), config.api_url.clone());
        let session = SessionContext::mount(auth, storage).await;
        Ok(Self::new(http, config.api_url.clone(), session))
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    /// Resolve `path` against the API base and append query pairs.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Url` if `path` is not a valid relative URL.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.inner.base.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET and decode JSON.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`]; also `ClientError::Parse` for bad bodies.
    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.execute(Method::GET, url, None).await?;
        decode(expect_success(response).await?).await
    }

    /// POST a JSON body and decode the JSON answer.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`]; also `ClientError::Parse` for bad bodies.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let response = self
            .execute(Method::POST, url, Some(serde_json::to_value(body)?))
            .await?;
        decode(expect_success(response).await?).await
    }

    /// PUT a JSON body and decode the JSON answer.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`]; also `ClientError::Parse` for bad bodies.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let response = self
            .execute(Method::PUT, url, Some(serde_json::to_value(body)?))
            .await?;
        decode(expect_success(response).await?).await
    }

    /// PATCH a JSON body and decode the JSON answer.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`]; also `ClientError::Parse` for bad bodies.
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let response = self
            .execute(Method::PATCH, url, Some(serde_json::to_value(body)?))
            .await?;
        decode(expect_success(response).await?).await
    }

    /// DELETE, ignoring any response body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn delete(&self, url: Url) -> Result<()> {
        let response = self.execute(Method::DELETE, url, None).await?;
        expect_success(response).await?;
        Ok(())
    }

    /// Send a request with the session's bearer token.
    ///
    /// Returns the response whatever its status, except for 401: that is
    /// answered by one refresh and one replay, and a second 401 becomes
    /// `ClientError::Unauthorized`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Http` on transport failure and
    /// `ClientError::Unauthorized` when the session cannot be renewed.
    #[instrument(skip(self, body), fields(method = %method, path = %url.path()))]
    pub async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let token = self.inner.session.access_token().await;
        let response = self
            .dispatch(&method, &url, body.as_ref(), token.as_ref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("Request unauthorized, refreshing session and retrying once");
        let fresh = match self.inner.session.refresh_after_rejection(token.as_ref()).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                return Err(ClientError::Unauthorized);
            }
        };

        let retried = self
            .dispatch(&method, &url, body.as_ref(), Some(&fresh))
            .await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("Request unauthorized after refresh, giving up");
            return Err(ClientError::Unauthorized);
        }
        Ok(retried)
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        token: Option<&SecretString>,
    ) -> Result<reqwest::Response> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        debug!(request_id = %request_id, status = %response.status(), "API response");
        Ok(response)
    }
}

/// Turn a non-success response into `ClientError::Api`.
///
/// # Errors
///
/// Returns `ClientError::Api` carrying the API's message.
pub async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(
        status = %status,
        body = %body.chars().take(500).collect::<String>(),
        "API returned non-success status"
    );
    Err(ClientError::from_response(status.as_u16(), &body))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse API response"
        );
        ClientError::Parse(e)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client() -> ApiClient {
        let base = Url::parse("https://api.crumb.test/v1/").unwrap();
        let http = reqwest::Client::new();
        let session = SessionContext::new(
            AuthApi::new(http.clone(), base.clone()),
            Arc::new(MemoryStore::new()),
        );
        ApiClient::new(http, base, session)
    }

    #[test]
    fn test_url_stays_under_base_path() {
        let api = client();
        assert_eq!(
            api.url("/products/3", &[]).unwrap().as_str(),
            "https://api.crumb.test/v1/products/3"
        );
    }

    #[test]
    fn test_url_encodes_query() {
        let api = client();
        let url = api
            .url(
                "orders",
                &[("branch", "2".to_string()), ("status", "ready now".to_string())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.crumb.test/v1/orders?branch=2&status=ready+now"
        );
    }
}
