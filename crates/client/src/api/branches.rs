//! `/branches` endpoints.

use crumb_core::BranchId;
use tracing::instrument;

use crate::error::Result;
use crate::http::ApiClient;
use crate::models::{Branch, BranchInput, Listing};

/// Client for store locations.
#[derive(Clone)]
pub struct BranchesApi {
    client: ApiClient,
}

impl BranchesApi {
    pub(crate) const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Branch>> {
        let listing: Listing<Branch> = self.client.get(self.client.url("branches", &[])?).await?;
        Ok(listing.into_items())
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with status 404 for unknown branches.
    #[instrument(skip(self), fields(branch = %id))]
    pub async fn get(&self, id: BranchId) -> Result<Branch> {
        self.client
            .get(self.client.url(&format!("branches/{id}"), &[])?)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &BranchInput) -> Result<Branch> {
        self.client
            .post(self.client.url("branches", &[])?, input)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(branch = %id))]
    pub async fn update(&self, id: BranchId, input: &BranchInput) -> Result<Branch> {
        self.client
            .put(self.client.url(&format!("branches/{id}"), &[])?, input)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self), fields(branch = %id))]
    pub async fn delete(&self, id: BranchId) -> Result<()> {
        self.client
            .delete(self.client.url(&format!("branches/{id}"), &[])?)
            .await
    }
}
