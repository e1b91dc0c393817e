//! Session and authentication context.
//!
//! [`SessionContext`] holds the access/refresh token pair and the identity
//! derived from it, mirrored to a [`KeyValueStore`] so a session survives
//! restarts. It is a cheap `Clone` handle; every clone sees the same state.
//!
//! # Lifecycle
//!
//! 1. [`SessionContext::mount`] restores whatever the store holds. An expired
//!    access token is refreshed before `mount` returns, so callers never
//!    render protected content with a dead token.
//! 2. [`SessionContext::login`], [`SessionContext::register`] or
//!    [`SessionContext::complete_oauth`] install a new token pair.
//! 3. [`SessionContext::refresh`] swaps the access token. When refreshing is
//!    impossible the context logs out.
//! 4. [`SessionContext::logout`] forgets the tokens, the cached identity and
//!    the user's cart. It never navigates anywhere; that is the caller's job.

pub mod auth;
pub mod token;

pub use auth::AuthApi;
pub use token::{Claims, Identity, TokenPair, decode_claims};

use std::sync::Arc;

use crumb_core::{Email, UserId};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, instrument, warn};

use crate::models::{NewAccount, User};
use crate::storage::{KeyValueStore, StorageError, load_json, save_json};

/// Storage keys owned by the session.
pub mod keys {
    use crumb_core::UserId;

    /// Current access token.
    pub const ACCESS_TOKEN: &str = "session.access_token";

    /// Current refresh token.
    pub const REFRESH_TOKEN: &str = "session.refresh_token";

    /// Cached identity record.
    pub const USER: &str = "session.user";

    /// Cart of `owner`, or of the anonymous visitor.
    #[must_use]
    pub fn cart(owner: Option<UserId>) -> String {
        owner.map_or_else(|| "cart:guest".to_string(), |id| format!("cart:{id}"))
    }
}

/// Errors that can occur while managing the session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The authentication request did not complete.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Login or sign-up was refused.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The refresh token was refused.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// There is no refresh token to exchange.
    #[error("No refresh token - login required")]
    NoRefreshToken,

    /// A token could not be decoded.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Persisting the session failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What a front end can know about the session at a given moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Stored credentials are still being restored.
    Loading,
    /// Nobody is logged in.
    Anonymous,
    /// A user is logged in.
    Authenticated(Identity),
}

enum Phase {
    Loading,
    Anonymous,
    Active { tokens: TokenPair, identity: Identity },
}

/// Shared session handle.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    auth: AuthApi,
    storage: Arc<dyn KeyValueStore>,
    phase: RwLock<Phase>,
    /// Serializes refreshes so concurrent 401s trigger a single exchange.
    refresh_lock: Mutex<()>,
    /// Who is logged in, for carts and views that follow the session.
    owner: watch::Sender<Option<UserId>>,
}

impl SessionContext {
    /// Create a context in the `Loading` state without touching storage.
    ///
    /// Most callers want [`SessionContext::mount`].
    #[must_use]
    pub fn new(auth: AuthApi, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                auth,
                storage,
                phase: RwLock::new(Phase::Loading),
                refresh_lock: Mutex::new(()),
                owner: watch::Sender::new(None),
            }),
        }
    }

    /// Follow who is logged in.
    ///
    /// The receiver sees `Some(id)` after every login or restore and `None`
    /// after logout.
    #[must_use]
    pub fn owner_changes(&self) -> watch::Receiver<Option<UserId>> {
        self.inner.owner.subscribe()
    }

    /// Create a context and restore the stored session.
    pub async fn mount(auth: AuthApi, storage: Arc<dyn KeyValueStore>) -> Self {
        let context = Self::new(auth, storage);
        context.restore().await;
        context
    }

    /// Restore the session from storage.
    ///
    /// Never fails: anything unusable in storage ends in the `Anonymous`
    /// state (and is cleared), after a warning.
    #[instrument(skip(self))]
    pub async fn restore(&self) {
        let storage = &self.inner.storage;
        let access = match storage.get(keys::ACCESS_TOKEN) {
            Ok(Some(access)) => access,
            Ok(None) => {
                debug!("No stored session");
                *self.inner.phase.write().await = Phase::Anonymous;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                *self.inner.phase.write().await = Phase::Anonymous;
                return;
            }
        };

        let claims = match decode_claims(&access) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Stored access token is unreadable, logging out");
                self.logout().await;
                return;
            }
        };

        if claims.is_expired() {
            info!("Stored access token expired, refreshing before first use");
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "Could not renew stored session");
            }
            return;
        }

        let refresh = storage
            .get(keys::REFRESH_TOKEN)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not read stored refresh token");
                None
            })
            .map(SecretString::from);
        let tokens = TokenPair {
            access: SecretString::from(access),
            refresh,
        };

        match self.install(tokens, &claims).await {
            Ok(identity) => debug!(user = %identity.id, role = %identity.role, "Session restored"),
            Err(e) => {
                warn!(error = %e, "Stored session is unusable, logging out");
                self.logout().await;
            }
        }
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        match &*self.inner.phase.read().await {
            Phase::Loading => SessionState::Loading,
            Phase::Anonymous => SessionState::Anonymous,
            Phase::Active { identity, .. } => SessionState::Authenticated(identity.clone()),
        }
    }

    /// The logged-in user, if any.
    pub async fn identity(&self) -> Option<Identity> {
        match &*self.inner.phase.read().await {
            Phase::Active { identity, .. } => Some(identity.clone()),
            Phase::Loading | Phase::Anonymous => None,
        }
    }

    /// The current access token, if any.
    pub async fn access_token(&self) -> Option<SecretString> {
        match &*self.inner.phase.read().await {
            Phase::Active { tokens, .. } => Some(tokens.access.clone()),
            Phase::Loading | Phase::Anonymous => None,
        }
    }

    /// Whether a user is logged in.
    pub async fn is_logged_in(&self) -> bool {
        matches!(&*self.inner.phase.read().await, Phase::Active { .. })
    }

    /// The storage backing this session (shared with the cart).
    #[must_use]
    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.inner.storage)
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AuthenticationFailed` if the credentials are
    /// refused, or a decoding/storage error if the issued token is unusable.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, SessionError> {
        let tokens = self.inner.auth.login(email, password).await?;
        let identity = self.install_tokens(tokens).await?;
        info!(user = %identity.id, role = %identity.role, "Logged in");
        Ok(identity)
    }

    /// Create a customer account and log it in.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AuthenticationFailed` if sign-up is refused.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register(&self, account: &NewAccount) -> Result<Identity, SessionError> {
        let tokens = self.inner.auth.register(account).await?;
        let identity = self.install_tokens(tokens).await?;
        info!(user = %identity.id, "Registered and logged in");
        Ok(identity)
    }

    /// Install the token pair delivered by an OAuth redirect.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToken` if the access token cannot be
    /// decoded.
    #[instrument(skip_all)]
    pub async fn complete_oauth(
        &self,
        access: String,
        refresh: Option<String>,
    ) -> Result<Identity, SessionError> {
        let identity = self
            .install_tokens(TokenPair {
                access: SecretString::from(access),
                refresh: refresh.map(SecretString::from),
            })
            .await?;
        info!(user = %identity.id, role = %identity.role, "Logged in through OAuth");
        Ok(identity)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// On any failure (no refresh token, refused, undecodable result) the
    /// session is logged out and the error returned.
    ///
    /// # Errors
    ///
    /// Returns the `SessionError` that made refreshing impossible.
    pub async fn refresh(&self) -> Result<SecretString, SessionError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh after the API rejected `rejected`.
    ///
    /// If another task already replaced that token while this one waited,
    /// the newer token is returned without another exchange.
    ///
    /// # Errors
    ///
    /// Same as [`SessionContext::refresh`].
    pub async fn refresh_after_rejection(
        &self,
        rejected: Option<&SecretString>,
    ) -> Result<SecretString, SessionError> {
        let _guard = self.inner.refresh_lock.lock().await;
        if let (Some(rejected), Some(current)) = (rejected, self.access_token().await)
            && current.expose_secret() != rejected.expose_secret()
        {
            debug!("Access token already renewed by a concurrent request");
            return Ok(current);
        }
        self.refresh_locked().await
    }

    #[instrument(skip(self))]
    async fn refresh_locked(&self) -> Result<SecretString, SessionError> {
        let Some(refresh_token) = self.current_refresh_token().await else {
            warn!("No refresh token available, logging out");
            self.logout().await;
            return Err(SessionError::NoRefreshToken);
        };

        let mut tokens = match self.inner.auth.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, logging out");
                self.logout().await;
                return Err(e);
            }
        };
        if tokens.refresh.is_none() {
            tokens.refresh = Some(refresh_token);
        }

        let access = tokens.access.clone();
        if let Err(e) = self.install_tokens(tokens).await {
            warn!(error = %e, "Refreshed token is unusable, logging out");
            self.logout().await;
            return Err(e);
        }
        debug!("Access token refreshed");
        Ok(access)
    }

    /// Log out.
    ///
    /// Removes the stored tokens, the cached identity and the current user's
    /// cart, and leaves the context `Anonymous`. Storage failures are logged;
    /// the in-memory session is cleared regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let owner = self.current_owner().await;
        let storage = &self.inner.storage;

        let mut doomed = vec![
            keys::ACCESS_TOKEN.to_string(),
            keys::REFRESH_TOKEN.to_string(),
            keys::USER.to_string(),
        ];
        if owner.is_some() {
            doomed.push(keys::cart(owner));
        }
        for key in &doomed {
            if let Err(e) = storage.remove(key) {
                warn!(key = %key, error = %e, "Could not remove stored session data");
            }
        }

        *self.inner.phase.write().await = Phase::Anonymous;
        self.inner.owner.send_replace(None);
        info!(user = ?owner.map(|id| id.get()), "Logged out");
    }

    /// Cache the richer profile returned by `/users/me`.
    ///
    /// Ignored unless `user` is the logged-in user. The token stays the
    /// authority for role and branch.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the record cannot be saved.
    pub async fn remember_profile(&self, user: &User) -> Result<(), SessionError> {
        let mut phase = self.inner.phase.write().await;
        let Phase::Active { identity, .. } = &mut *phase else {
            return Ok(());
        };
        if identity.id != user.id {
            return Ok(());
        }
        identity.username.clone_from(&user.username);
        if let Ok(email) = Email::parse(&user.email) {
            identity.email = Some(email);
        }
        if !user.name.is_empty() {
            identity.name = Some(user.name.clone());
        }
        save_json(self.inner.storage.as_ref(), keys::USER, &*identity)?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn install_tokens(&self, tokens: TokenPair) -> Result<Identity, SessionError> {
        let claims = decode_claims(tokens.access.expose_secret())?;
        self.install(tokens, &claims).await
    }

    /// Derive the identity, persist everything and become `Active`.
    async fn install(&self, tokens: TokenPair, claims: &Claims) -> Result<Identity, SessionError> {
        let storage = self.inner.storage.as_ref();
        let from_token = Identity::from_claims(claims)?;

        let identity = match load_json::<Identity>(storage, keys::USER) {
            Ok(Some(cached)) if cached.id == from_token.id => merge_cached(from_token, cached),
            Ok(Some(cached)) => {
                debug!(cached = %cached.id, token = %from_token.id, "Discarding identity of another user");
                from_token
            }
            Ok(None) => from_token,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached identity");
                from_token
            }
        };

        storage.set(keys::ACCESS_TOKEN, tokens.access.expose_secret())?;
        match &tokens.refresh {
            Some(refresh) => storage.set(keys::REFRESH_TOKEN, refresh.expose_secret())?,
            None => storage.remove(keys::REFRESH_TOKEN)?,
        }
        save_json(storage, keys::USER, &identity)?;

        *self.inner.phase.write().await = Phase::Active {
            tokens,
            identity: identity.clone(),
        };
        self.inner.owner.send_if_modified(|owner| {
            let changed = *owner != Some(identity.id);
            *owner = Some(identity.id);
            changed
        });
        Ok(identity)
    }

    async fn current_refresh_token(&self) -> Option<SecretString> {
        if let Phase::Active { tokens, .. } = &*self.inner.phase.read().await {
            return tokens.refresh.clone();
        }
        self.inner
            .storage
            .get(keys::REFRESH_TOKEN)
            .ok()
            .flatten()
            .map(SecretString::from)
    }

    /// Whose cart belongs to the session being torn down.
    async fn current_owner(&self) -> Option<UserId> {
        if let Phase::Active { identity, .. } = &*self.inner.phase.read().await {
            return Some(identity.id);
        }
        let storage = self.inner.storage.as_ref();
        if let Ok(Some(cached)) = load_json::<Identity>(storage, keys::USER) {
            return Some(cached.id);
        }
        storage
            .get(keys::ACCESS_TOKEN)
            .ok()
            .flatten()
            .and_then(|access| decode_claims(&access).ok())
            .and_then(|claims| claims.subject().ok())
    }
}

/// Combine the token identity with a cached record of the same user.
///
/// Profile fields come from the cache when it has them; role and branch
/// always come from the token.
fn merge_cached(from_token: Identity, cached: Identity) -> Identity {
    Identity {
        id: from_token.id,
        username: cached.username,
        email: cached.email.or(from_token.email),
        name: cached.name.or(from_token.name),
        role: from_token.role,
        branch: from_token.branch,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use crumb_core::{Email, Role};
    use serde_json::json;

    use super::token::tests::mint;
    use super::*;
    use crate::storage::MemoryStore;

    /// Nothing listens here; tests that reach the network fail fast.
    pub(crate) fn offline_auth() -> AuthApi {
        AuthApi::new(
            reqwest::Client::new(),
            url::Url::parse("http://127.0.0.1:9/").unwrap(),
        )
    }

    pub(crate) fn token_for(id: i64, role: &str, exp_offset: i64) -> String {
        mint(&json!({
            "sub": id,
            "exp": chrono::Utc::now().timestamp() + exp_offset,
            "username": format!("user{id}"),
            "role": role,
        }))
    }

    #[tokio::test]
    async fn test_mount_without_session_is_anonymous() {
        let ctx = SessionContext::mount(offline_auth(), Arc::new(MemoryStore::new())).await;
        assert_eq!(ctx.state().await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_new_context_is_loading() {
        let ctx = SessionContext::new(offline_auth(), Arc::new(MemoryStore::new()));
        assert_eq!(ctx.state().await, SessionState::Loading);
    }

    #[tokio::test]
    async fn test_oauth_then_restore() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ctx = SessionContext::mount(offline_auth(), Arc::clone(&storage)).await;
        let identity = ctx
            .complete_oauth(token_for(5, "customer", 3600), Some("r1".to_string()))
            .await
            .unwrap();
        assert_eq!(identity.id, UserId::new(5));

        let restored = SessionContext::mount(offline_auth(), storage).await;
        assert_eq!(restored.identity().await, Some(identity));
    }

    #[tokio::test]
    async fn test_cached_identity_enriches_matching_token() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cached = Identity {
            id: UserId::new(5),
            username: "lucia".to_string(),
            email: Some(Email::parse("lucia@crumb.test").unwrap()),
            name: Some("Lucía".to_string()),
            // stale role in the cache must not win over the token
            role: Role::GeneralAdmin,
            branch: None,
        };
        save_json(storage.as_ref(), keys::USER, &cached).unwrap();
        storage
            .set(keys::ACCESS_TOKEN, &token_for(5, "customer", 3600))
            .unwrap();

        let ctx = SessionContext::mount(offline_auth(), storage).await;
        let identity = ctx.identity().await.unwrap();
        assert_eq!(identity.display_name(), "Lucía");
        assert_eq!(identity.role, Role::Customer);
    }

    #[tokio::test]
    async fn test_cached_identity_of_other_user_is_discarded() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let stranger = Identity {
            id: UserId::new(99),
            username: "stranger".to_string(),
            email: None,
            name: Some("Stranger".to_string()),
            role: Role::GeneralAdmin,
            branch: None,
        };
        save_json(storage.as_ref(), keys::USER, &stranger).unwrap();
        storage
            .set(keys::ACCESS_TOKEN, &token_for(5, "customer", 3600))
            .unwrap();

        let ctx = SessionContext::mount(offline_auth(), Arc::clone(&storage)).await;
        let identity = ctx.identity().await.unwrap();
        assert_eq!(identity.id, UserId::new(5));
        assert_eq!(identity.username, "user5");

        let stored: Identity = load_json(storage.as_ref(), keys::USER).unwrap().unwrap();
        assert_eq!(stored.id, UserId::new(5));
    }

    #[tokio::test]
    async fn test_garbage_token_logs_out() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        storage.set(keys::ACCESS_TOKEN, "garbage").unwrap();
        storage.set(keys::REFRESH_TOKEN, "r").unwrap();

        let ctx = SessionContext::mount(offline_auth(), Arc::clone(&storage)).await;
        assert_eq!(ctx.state().await, SessionState::Anonymous);
        assert!(storage.get(keys::REFRESH_TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_token_logs_out() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ctx = SessionContext::mount(offline_auth(), Arc::clone(&storage)).await;
        ctx.complete_oauth(token_for(8, "customer", 3600), None)
            .await
            .unwrap();

        let result = ctx.refresh().await;
        assert!(matches!(result, Err(SessionError::NoRefreshToken)));
        assert!(!ctx.is_logged_in().await);
        assert!(storage.get(keys::ACCESS_TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_removes_cart_of_current_user_only() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        storage.set(&keys::cart(Some(UserId::new(1))), "[]").unwrap();
        storage.set(&keys::cart(Some(UserId::new(2))), "[]").unwrap();

        let ctx = SessionContext::mount(offline_auth(), Arc::clone(&storage)).await;
        ctx.complete_oauth(token_for(1, "customer", 3600), Some("r".to_string()))
            .await
            .unwrap();
        ctx.logout().await;

        assert!(storage.get("cart:1").unwrap().is_none());
        assert!(storage.get("cart:2").unwrap().is_some());
        assert!(storage.get(keys::USER).unwrap().is_none());
        assert_eq!(ctx.state().await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_remember_profile_only_for_current_user() {
        let ctx = SessionContext::mount(offline_auth(), Arc::new(MemoryStore::new())).await;
        ctx.complete_oauth(token_for(3, "branch_admin", 3600), None)
            .await
            .unwrap();

        let me = User {
            id: UserId::new(3),
            username: "rosa".to_string(),
            email: "rosa@crumb.test".to_string(),
            name: "Rosa".to_string(),
            role: Role::Customer,
            branch: None,
            phone: None,
            address: None,
        };
        ctx.remember_profile(&me).await.unwrap();
        let identity = ctx.identity().await.unwrap();
        assert_eq!(identity.display_name(), "Rosa");
        assert_eq!(identity.role, Role::BranchAdmin);

        let other = User {
            id: UserId::new(4),
            name: "Other".to_string(),
            ..me
        };
        ctx.remember_profile(&other).await.unwrap();
        assert_eq!(ctx.identity().await.unwrap().display_name(), "Rosa");
    }

    #[tokio::test]
    async fn test_owner_changes_follow_login_and_logout() {
        let ctx = SessionContext::mount(offline_auth(), Arc::new(MemoryStore::new())).await;
        let mut owner = ctx.owner_changes();
        assert_eq!(*owner.borrow_and_update(), None);

        ctx.complete_oauth(token_for(6, "customer", 3600), None)
            .await
            .unwrap();
        assert!(owner.has_changed().unwrap());
        assert_eq!(*owner.borrow_and_update(), Some(UserId::new(6)));

        // Same account again: nothing new to report.
        ctx.complete_oauth(token_for(6, "customer", 7200), None)
            .await
            .unwrap();
        assert!(!owner.has_changed().unwrap());

        ctx.logout().await;
        assert!(owner.has_changed().unwrap());
        assert_eq!(*owner.borrow_and_update(), None);
    }

    #[test]
    fn test_cart_keys() {
        assert_eq!(keys::cart(None), "cart:guest");
        assert_eq!(keys::cart(Some(UserId::new(12))), "cart:12");
    }
}
