//! In-memory catalog cache.
//!
//! Product and offer listings change rarely compared to how often they are
//! browsed, so listings are kept per branch for a configurable TTL (5 minutes
//! by default). Writes made through this client invalidate the cache; writes
//! made elsewhere show up once the TTL expires.

use std::sync::Arc;
use std::time::Duration;

use crumb_core::BranchId;
use moka::future::Cache;
use tracing::debug;

use crate::models::{Offer, Product};

/// Upper bound on cached listings.
const MAX_ENTRIES: u64 = 256;

/// What a cached listing holds.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products { branch: Option<BranchId> },
    Offers { branch: Option<BranchId> },
}

/// A cached listing.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Arc<Vec<Product>>),
    Offers(Arc<Vec<Offer>>),
}

/// Shared catalog cache. Clones share the same entries.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub async fn products(&self, branch: Option<BranchId>) -> Option<Arc<Vec<Product>>> {
        match self.cache.get(&CacheKey::Products { branch }).await {
            Some(CacheValue::Products(products)) => {
                debug!(branch = ?branch.map(|b| b.get()), "Cache hit for products");
                Some(products)
            }
            _ => None,
        }
    }

    pub async fn offers(&self, branch: Option<BranchId>) -> Option<Arc<Vec<Offer>>> {
        match self.cache.get(&CacheKey::Offers { branch }).await {
            Some(CacheValue::Offers(offers)) => {
                debug!(branch = ?branch.map(|b| b.get()), "Cache hit for offers");
                Some(offers)
            }
            _ => None,
        }
    }

    pub async fn store_products(&self, branch: Option<BranchId>, products: Arc<Vec<Product>>) {
        self.cache
            .insert(CacheKey::Products { branch }, CacheValue::Products(products))
            .await;
    }

    pub async fn store_offers(&self, branch: Option<BranchId>, offers: Arc<Vec<Offer>>) {
        self.cache
            .insert(CacheKey::Offers { branch }, CacheValue::Offers(offers))
            .await;
    }

    /// Forget every cached listing.
    ///
    /// A product or offer appears in both its branch listing and the
    /// unfiltered one, so everything goes.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("Catalog cache cleared");
    }
}
