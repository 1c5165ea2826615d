//! Product catalog and stock service collaborators.
//!
//! # Architecture
//!
//! - [`ProductCatalog`] answers "what are product X's display details"
//! - [`StockOracle`] answers "how many units of product X are available"
//! - [`ApiClient`] implements both over the RocketShoes REST API with `reqwest`
//! - [`CachedCatalog`] caches product details in memory via `moka`; stock
//!   levels are never cached
//!
//! Neither trait retries. A failure surfaces as an [`ApiError`] and the cart
//! store decides what the shopper is told.
//!
//! # Example
//!
//! ```rust,ignore
//! use rocketshoes_cart::catalog::{ApiClient, ProductCatalog, StockOracle};
//!
//! let client = ApiClient::new(&config.api)?;
//!
//! let product = client.fetch_product(ProductId::new(1)).await?;
//! let stock = client.fetch_stock(ProductId::new(1)).await?;
//! ```

mod cache;
mod client;

pub use cache::CachedCatalog;
pub use client::ApiClient;

use std::sync::Arc;

use async_trait::async_trait;
use rocketshoes_core::{ProductDetails, ProductId, StockLevel};
use thiserror::Error;

/// Errors that can occur when talking to the catalog API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The requested product (or its stock record) does not exist.
    #[error("Not found: {0}")]
    NotFound(ProductId),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Building a request URL failed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether the failure means the resource does not exist, as opposed to
    /// the service being unreachable or misbehaving.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Lookup of product display details.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch details for `id`.
    ///
    /// Fails with `ApiError::NotFound` for unknown products.
    async fn fetch_product(&self, id: ProductId) -> Result<ProductDetails, ApiError>;
}

/// Lookup of current stock levels.
#[async_trait]
pub trait StockOracle: Send + Sync {
    /// Fetch the current stock level of `id`. Never served from a cache.
    async fn fetch_stock(&self, id: ProductId) -> Result<StockLevel, ApiError>;
}

#[async_trait]
impl<T: ProductCatalog + ?Sized> ProductCatalog for Arc<T> {
    async fn fetch_product(&self, id: ProductId) -> Result<ProductDetails, ApiError> {
        (**self).fetch_product(id).await
    }
}

#[async_trait]
impl<T: StockOracle + ?Sized> StockOracle for Arc<T> {
    async fn fetch_stock(&self, id: ProductId) -> Result<StockLevel, ApiError> {
        (**self).fetch_stock(id).await
    }
}
