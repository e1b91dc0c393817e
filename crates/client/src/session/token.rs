//! Access token decoding.
//!
//! Access tokens are JWTs signed by the API. The client never verifies the
//! signature (it does not hold the key and the server re-checks every
//! request); it only reads the payload to learn who is logged in and when
//! the token expires.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use crumb_core::{BranchId, Email, Role, UserId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::SessionError;

/// Tokens are treated as expired this many seconds early to absorb clock
/// skew and request latency.
pub const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Access and refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Short-lived bearer token.
    pub access: SecretString,
    /// Longer-lived token exchanged for new access tokens.
    pub refresh: Option<SecretString>,
}

/// Claims read from an access token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry as a Unix timestamp.
    pub exp: i64,
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "branch_id")]
    pub branch: Option<BranchId>,
}

impl Claims {
    /// The user the token was issued to.
    ///
    /// Looks at `sub`, then `user_id`, then `id`, accepting numbers and
    /// numeric strings.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToken` if none holds a user ID.
    pub fn subject(&self) -> Result<UserId, SessionError> {
        [&self.sub, &self.user_id, &self.id]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .map(UserId::new)
            .ok_or_else(|| SessionError::InvalidToken("token has no subject".to_string()))
    }

    /// Whether the token is expired (or about to be) at `now`.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp.saturating_sub(EXPIRY_LEEWAY_SECS)
    }

    /// Whether the token is expired (or about to be) right now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// Decode the payload of a JWT without verifying it.
///
/// # Errors
///
/// Returns `SessionError::InvalidToken` for anything that is not a
/// three-part token with a base64url JSON payload.
pub fn decode_claims(token: &str) -> Result<Claims, SessionError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionError::InvalidToken(
            "expected three dot-separated parts".to_string(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SessionError::InvalidToken(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::InvalidToken(format!("payload is not valid claims: {e}")))
}

/// Who is logged in.
///
/// Derived from the access token claims. The API's `/users/me` record can
/// carry more detail; a cached copy is kept in storage as long as its `id`
/// matches the token subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub branch: Option<BranchId>,
}

impl Identity {
    /// Build the identity carried by a token.
    ///
    /// A missing role means a customer token; an unknown role is an error
    /// rather than a silent downgrade.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToken` if the subject is missing or the
    /// role is not recognized.
    pub fn from_claims(claims: &Claims) -> Result<Self, SessionError> {
        let id = claims.subject()?;
        let role = match claims.role.as_deref() {
            None => Role::Customer,
            Some(raw) => raw
                .parse()
                .map_err(|e| SessionError::InvalidToken(format!("{e}")))?,
        };
        let email = claims.email.as_deref().and_then(|e| Email::parse(e).ok());
        let username = claims
            .username
            .clone()
            .or_else(|| email.as_ref().map(|e| e.local_part().to_owned()))
            .unwrap_or_else(|| format!("user{id}"));

        Ok(Self {
            id,
            username,
            email,
            name: claims.name.clone(),
            role,
            branch: claims.branch,
        })
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.username)
    }
}
