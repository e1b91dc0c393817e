//! Typed endpoints of the bakery REST API.
//!
//! [`Api`] bundles the authenticated [`ApiClient`] with the catalog cache and
//! hands out one small client per resource:
//!
//! ```rust,ignore
//! let api = Api::connect(&config, storage).await?;
//! let products = api.products().list(Some(branch)).await?;
//! let order = api.orders().get(OrderId::new(12)).await?;
//! ```

mod branches;
mod offers;
mod orders;
mod products;
mod reports;
mod users;

pub use branches::BranchesApi;
pub use offers::OffersApi;
pub use orders::{OrderFilter, OrdersApi};
pub use products::ProductsApi;
pub use reports::ReportsApi;
pub use users::UsersApi;

use std::sync::Arc;

use crate::cache::CatalogCache;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::ApiClient;
use crate::session::SessionContext;
use crate::storage::KeyValueStore;

/// Entry point to every resource of the API.
#[derive(Clone)]
pub struct Api {
    client: ApiClient,
    cache: CatalogCache,
}

impl Api {
    #[must_use]
    pub const fn new(client: ApiClient, cache: CatalogCache) -> Self {
        Self { client, cache }
    }

    /// Build the HTTP client, restore the session from `storage` and set up
    /// the catalog cache.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Http` if the HTTP client cannot be built.
    pub async fn connect(config: &ClientConfig, storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let client = ApiClient::connect(config, storage).await?;
        Ok(Self::new(client, CatalogCache::new(config.catalog_ttl)))
    }

    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        self.client.session()
    }

    #[must_use]
    pub const fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    #[must_use]
    pub fn products(&self) -> ProductsApi {
        ProductsApi::new(self.client.clone(), self.cache.clone())
    }

    #[must_use]
    pub fn offers(&self) -> OffersApi {
        OffersApi::new(self.client.clone(), self.cache.clone())
    }

    #[must_use]
    pub fn orders(&self) -> OrdersApi {
        OrdersApi::new(self.client.clone(), self.cache.clone())
    }

    #[must_use]
    pub fn users(&self) -> UsersApi {
        UsersApi::new(self.client.clone())
    }

    #[must_use]
    pub fn branches(&self) -> BranchesApi {
        BranchesApi::new(self.client.clone())
    }

    #[must_use]
    pub fn reports(&self) -> ReportsApi {
        ReportsApi::new(self.client.clone())
    }
}
