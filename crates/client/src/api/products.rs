//! `/products` endpoints.

use std::sync::Arc;

use crumb_core::{BranchId, ProductId};
use tracing::instrument;

use crate::cache::CatalogCache;
use crate::error::Result;
use crate::http::ApiClient;
use crate::models::{Listing, Product, ProductInput};

/// Client for the product catalog.
#[derive(Clone)]
pub struct ProductsApi {
    client: ApiClient,
    cache: CatalogCache,
}

impl ProductsApi {
    pub(crate) const fn new(client: ApiClient, cache: CatalogCache) -> Self {
        Self { client, cache }
    }

    /// List products, optionally of a single branch. Served from the
    /// catalog cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self), fields(branch = ?branch.map(|b| b.get())))]
    pub async fn list(&self, branch: Option<BranchId>) -> Result<Arc<Vec<Product>>> {
        if let Some(products) = self.cache.products(branch).await {
            return Ok(products);
        }

        let query: Vec<(&str, String)> = branch
            .map(|b| vec![("branch", b.to_string())])
            .unwrap_or_default();
        let listing: Listing<Product> = self.client.get(self.client.url("products", &query)?).await?;
        let products = Arc::new(listing.into_items());
        self.cache.store_products(branch, Arc::clone(&products)).await;
        Ok(products)
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with status 404 for unknown products.
    #[instrument(skip(self), fields(product = %id))]
    pub async fn get(&self, id: ProductId) -> Result<Product> {
        self.client
            .get(self.client.url(&format!("products/{id}"), &[])?)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &ProductInput) -> Result<Product> {
        let product = self
            .client
            .post(self.client.url("products", &[])?, input)
            .await?;
        self.cache.invalidate_all().await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(product = %id))]
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product> {
        let product = self
            .client
            .put(self.client.url(&format!("products/{id}"), &[])?, input)
            .await?;
        self.cache.invalidate_all().await;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self), fields(product = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<()> {
        self.client
            .delete(self.client.url(&format!("products/{id}"), &[])?)
            .await?;
        self.cache.invalidate_all().await;
        Ok(())
    }
}
