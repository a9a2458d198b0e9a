//! Product lookup with in-memory caching.

use std::time::Duration;

use moka::future::Cache;
use reqwest::Method;
use tracing::{debug, instrument};

use basket_core::{Product, ProductId};

use super::{ApiClient, RemoteError};

/// Product catalog lookups (`GET /products/{id}`).
///
/// Products are cached for the configured TTL. Only the display data a
/// guest collection snapshots comes from here; authenticated collections
/// carry server-side prices.
#[derive(Clone)]
pub struct Catalog {
    api: ApiClient,
    cache: Cache<ProductId, Product>,
}

impl Catalog {
    /// Create a catalog client.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(ttl)
            .build();
        Self { api, cache }
    }

    /// Look up a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` for unknown products, or any other
    /// `RemoteError` if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product, RemoteError> {
        if let Some(product) = self.cache.get(&id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let request = self.api.request(Method::GET, &format!("products/{id}"))?;
        let product: Product = self.api.execute_json(request).await?;
        self.cache.insert(id, product.clone()).await;
        Ok(product)
    }
}
