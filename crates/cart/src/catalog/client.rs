//! RocketShoes REST API client.
//!
//! - `GET {base_url}/products/{id}` returns product details
//! - `GET {base_url}/stock/{id}` returns `{ "id": .., "amount": .. }`

use std::sync::Arc;

use async_trait::async_trait;
use rocketshoes_core::{ProductDetails, ProductId, StockLevel};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::{ApiError, ProductCatalog, StockOracle};
use crate::config::ApiConfig;

/// Characters of an error body kept in errors and logs.
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the RocketShoes catalog and stock endpoints.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                token: config.token.clone(),
            }),
        })
    }

    fn resource_url(&self, collection: &str, id: ProductId) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(&format!("{collection}/{id}"))?)
    }

    /// GET a JSON resource belonging to product `id`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: ProductId,
    ) -> Result<T, ApiError> {
        let url = self.resource_url(collection, id)?;

        let mut request = self
            .inner
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(id));
        }

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&body),
                "Catalog API returned non-success status"
            );
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body),
                "Failed to parse catalog API response"
            );
            ApiError::Parse(e)
        })
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

#[async_trait]
impl ProductCatalog for ApiClient {
    #[instrument(skip(self), fields(base_url = %self.inner.base_url))]
    async fn fetch_product(&self, id: ProductId) -> Result<ProductDetails, ApiError> {
        let product: ProductDetails = self.get_json("products", id).await?;
        tracing::debug!(title = ?product.title(), "Fetched product details");
        Ok(product)
    }
}

#[async_trait]
impl StockOracle for ApiClient {
    #[instrument(skip(self), fields(base_url = %self.inner.base_url))]
    async fn fetch_stock(&self, id: ProductId) -> Result<StockLevel, ApiError> {
        let stock: StockLevel = self.get_json("stock", id).await?;
        tracing::debug!(available = stock.available, "Fetched stock level");
        Ok(stock)
    }
}
