//! Authentication endpoints.
//!
//! Credential login, customer sign-up and refresh-token exchange. These
//! calls never carry a bearer token and never go through the 401 retry in
//! [`crate::http::ApiClient`]; a rejected refresh here is final.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use super::SessionError;
use super::token::TokenPair;
use crate::models::NewAccount;

/// Request body for credential login.
#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Request body for the refresh endpoint.
#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Token response shared by login, sign-up and refresh.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    access: String,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

/// Error body from the authentication endpoints.
#[derive(Deserialize)]
struct AuthErrorResponse {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the `/auth/*` endpoints.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: reqwest::Client,
    base: Url,
}

impl AuthApi {
    #[must_use]
    pub const fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Exchange email and password for a token pair.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AuthenticationFailed` if the credentials are
    /// refused and `SessionError::Http` on transport failures.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<TokenPair, SessionError> {
        let response = self
            .client
            .post(self.base.join("auth/login")?)
            .json(&LoginRequest {
                email,
                password: password.expose_secret(),
            })
            .send()
            .await?;
        token_pair(response, SessionError::AuthenticationFailed).await
    }

    /// Create a customer account and log it in.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AuthenticationFailed` with the API's reason
    /// (e.g. duplicate email) if sign-up is refused.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register(&self, account: &NewAccount) -> Result<TokenPair, SessionError> {
        let response = self
            .client
            .post(self.base.join("auth/register")?)
            .json(account)
            .send()
            .await?;
        token_pair(response, SessionError::AuthenticationFailed).await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The API may rotate the refresh token; when it does not, the caller
    /// keeps the old one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RefreshFailed` if the refresh token is
    /// rejected.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, SessionError> {
        let response = self
            .client
            .post(self.base.join("auth/refresh")?)
            .json(&RefreshRequest {
                refresh: refresh_token.expose_secret(),
            })
            .send()
            .await?;
        token_pair(response, SessionError::RefreshFailed).await
    }
}

async fn token_pair(
    response: reqwest::Response,
    refused: fn(String) -> SessionError,
) -> Result<TokenPair, SessionError> {
    let status = response.status();

    if status.is_success() {
        let tokens: TokenResponse = response.json().await?;
        return Ok(TokenPair {
            access: SecretString::from(tokens.access),
            refresh: tokens.refresh.map(SecretString::from),
        });
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let reason = serde_json::from_str::<AuthErrorResponse>(&text)
        .ok()
        .and_then(|body| body.detail.or(body.message).or(body.error))
        .unwrap_or_else(|| {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                "Invalid credentials".to_string()
            } else {
                format!("HTTP {status}: {}", text.chars().take(200).collect::<String>())
            }
        });

    Err(refused(reason))
}
