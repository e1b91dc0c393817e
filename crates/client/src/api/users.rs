//! `/users` endpoints.

use crumb_core::{BranchId, UserId};
use tracing::{instrument, warn};

use crate::error::Result;
use crate::http::ApiClient;
use crate::models::{Listing, ProfileUpdate, User, UserInput};

/// Client for user accounts.
#[derive(Clone)]
pub struct UsersApi {
    client: ApiClient,
}

impl UsersApi {
    pub(crate) const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// List accounts, optionally of a single branch (general admin).
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list(&self, branch: Option<BranchId>) -> Result<Vec<User>> {
        let query: Vec<(&str, String)> = branch
            .map(|b| vec![("branch", b.to_string())])
            .unwrap_or_default();
        let listing: Listing<User> = self.client.get(self.client.url("users", &query)?).await?;
        Ok(listing.into_items())
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with status 404 for unknown users.
    #[instrument(skip(self), fields(user = %id))]
    pub async fn get(&self, id: UserId) -> Result<User> {
        self.client
            .get(self.client.url(&format!("users/{id}"), &[])?)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(username = %input.username, role = %input.role))]
    pub async fn create(&self, input: &UserInput) -> Result<User> {
        self.client
            .post(self.client.url("users", &[])?, input)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(user = %id))]
    pub async fn update(&self, id: UserId, input: &UserInput) -> Result<User> {
        self.client
            .put(self.client.url(&format!("users/{id}"), &[])?, input)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self), fields(user = %id))]
    pub async fn delete(&self, id: UserId) -> Result<()> {
        self.client
            .delete(self.client.url(&format!("users/{id}"), &[])?)
            .await
    }

    /// The logged-in user's profile. Also refreshes the cached identity.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` when nobody is logged in.
    #[instrument(skip(self))]
    pub async fn me(&self) -> Result<User> {
        let user: User = self.client.get(self.client.url("users/me", &[])?).await?;
        self.remember(&user).await;
        Ok(user)
    }

    /// Change the logged-in user's own profile.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        if update.is_empty() {
            return self.me().await;
        }
        let user: User = self
            .client
            .put(self.client.url("users/me", &[])?, update)
            .await?;
        self.remember(&user).await;
        Ok(user)
    }

    async fn remember(&self, user: &User) {
        if let Err(e) = self.client.session().remember_profile(user).await {
            warn!(error = %e, "Could not cache profile");
        }
    }
}
