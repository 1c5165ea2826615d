//! In-memory cache for product details.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use rocketshoes_core::{ProductDetails, ProductId};
use tracing::{debug, instrument};

use super::{ApiError, ProductCatalog};

/// Maximum number of products kept in the cache.
const MAX_CACHED_PRODUCTS: u64 = 1000;

/// A [`ProductCatalog`] that remembers successful lookups for a fixed TTL.
///
/// Failures are not cached, so an unknown product is looked up again on the
/// next request.
pub struct CachedCatalog<C> {
    inner: C,
    cache: Cache<ProductId, ProductDetails>,
}

impl<C: ProductCatalog> CachedCatalog<C> {
    /// Wrap `inner`, caching its answers for `ttl`.
    #[must_use]
    pub fn new(inner: C, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHED_PRODUCTS)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    /// Drop a cached product so the next lookup goes to the catalog.
    pub async fn invalidate(&self, id: ProductId) {
        self.cache.invalidate(&id).await;
    }
}

#[async_trait]
impl<C: ProductCatalog> ProductCatalog for CachedCatalog<C> {
    #[instrument(skip(self))]
    async fn fetch_product(&self, id: ProductId) -> Result<ProductDetails, ApiError> {
        if let Some(product) = self.cache.get(&id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let product = self.inner.fetch_product(id).await?;

        self.cache.insert(id, product.clone()).await;

        Ok(product)
    }
}
