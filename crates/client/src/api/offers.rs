//! `/offers` endpoints.

use std::sync::Arc;

use chrono::Utc;
use crumb_core::{BranchId, OfferId};
use tracing::instrument;

use crate::cache::CatalogCache;
use crate::error::Result;
use crate::http::ApiClient;
use crate::models::{Listing, Offer, OfferInput};

/// Client for promotional bundles.
#[derive(Clone)]
pub struct OffersApi {
    client: ApiClient,
    cache: CatalogCache,
}

impl OffersApi {
    pub(crate) const fn new(client: ApiClient, cache: CatalogCache) -> Self {
        Self { client, cache }
    }

    /// List offers, optionally of a single branch, including inactive and
    /// expired ones. Served from the catalog cache when possible.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self), fields(branch = ?branch.map(|b| b.get())))]
    pub async fn list(&self, branch: Option<BranchId>) -> Result<Arc<Vec<Offer>>> {
        if let Some(offers) = self.cache.offers(branch).await {
            return Ok(offers);
        }

        let query: Vec<(&str, String)> = branch
            .map(|b| vec![("branch", b.to_string())])
            .unwrap_or_default();
        let listing: Listing<Offer> = self.client.get(self.client.url("offers", &query)?).await?;
        let offers = Arc::new(listing.into_items());
        self.cache.store_offers(branch, Arc::clone(&offers)).await;
        Ok(offers)
    }

    /// Offers a customer can add to the cart right now.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    pub async fn available(&self, branch: Option<BranchId>) -> Result<Vec<Offer>> {
        let now = Utc::now();
        Ok(self
            .list(branch)
            .await?
            .iter()
            .filter(|offer| offer.is_available_at(now))
            .cloned()
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with status 404 for unknown offers.
    #[instrument(skip(self), fields(offer = %id))]
    pub async fn get(&self, id: OfferId) -> Result<Offer> {
        self.client
            .get(self.client.url(&format!("offers/{id}"), &[])?)
            .await
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &OfferInput) -> Result<Offer> {
        let offer = self
            .client
            .post(self.client.url("offers", &[])?, input)
            .await?;
        self.cache.invalidate_all().await;
        Ok(offer)
    }

    /// # Errors
    ///
    /// Returns `ClientError::Api` with the validation message on refusal.
    #[instrument(skip(self, input), fields(offer = %id))]
    pub async fn update(&self, id: OfferId, input: &OfferInput) -> Result<Offer> {
        let offer = self
            .client
            .put(self.client.url(&format!("offers/{id}"), &[])?, input)
            .await?;
        self.cache.invalidate_all().await;
        Ok(offer)
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    #[instrument(skip(self), fields(offer = %id))]
    pub async fn delete(&self, id: OfferId) -> Result<()> {
        self.client
            .delete(self.client.url(&format!("offers/{id}"), &[])?)
            .await?;
        self.cache.invalidate_all().await;
        Ok(())
    }
}
