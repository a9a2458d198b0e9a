//! REST-backed cart and favorites.

use reqwest::Method;
use tracing::{debug, instrument};

use basket_core::wire::{AddCartItemRequest, AddFavoriteRequest, UpdateQuantityRequest};
use basket_core::{ProductId, RemoteItem, RemoteItemId};

use super::{ApiClient, RemoteError, RemoteStore};

/// The authenticated user's cart (`/cart/items`).
#[derive(Clone)]
pub struct RestCart {
    api: ApiClient,
}

impl RestCart {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl RemoteStore for RestCart {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError> {
        let request = self.api.authenticated(Method::GET, "cart/items")?;
        self.api.execute_json(request).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add(&self, product_id: ProductId, quantity: u32) -> Result<(), RemoteError> {
        let request = self
            .api
            .authenticated(Method::POST, "cart/items")?
            .json(&AddCartItemRequest {
                product_id,
                quantity,
            });
        self.api.execute(request).await.map(drop)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn update(&self, item_id: RemoteItemId, quantity: u32) -> Result<(), RemoteError> {
        let request = self
            .api
            .authenticated(Method::PATCH, &format!("cart/items/{item_id}"))?
            .json(&UpdateQuantityRequest { quantity });
        self.api.execute(request).await.map(drop)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remove(&self, item_id: RemoteItemId) -> Result<(), RemoteError> {
        let request = self
            .api
            .authenticated(Method::DELETE, &format!("cart/items/{item_id}"))?;
        self.api.execute(request).await.map(drop)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), RemoteError> {
        let request = self.api.authenticated(Method::DELETE, "cart/items")?;
        self.api.execute(request).await.map(drop)
    }
}

/// The authenticated user's favorites (`/favorites`).
#[derive(Clone)]
pub struct RestFavorites {
    api: ApiClient,
}

impl RestFavorites {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl RemoteStore for RestFavorites {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError> {
        let request = self.api.authenticated(Method::GET, "favorites")?;
        self.api.execute_json(request).await
    }

    /// Favorites have no quantity; `_quantity` is ignored.
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add(&self, product_id: ProductId, _quantity: u32) -> Result<(), RemoteError> {
        let request = self
            .api
            .authenticated(Method::POST, "favorites")?
            .json(&AddFavoriteRequest { product_id });
        self.api.execute(request).await.map(drop)
    }

    /// Favorites have no quantity, so there is nothing to send.
    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn update(&self, item_id: RemoteItemId, _quantity: u32) -> Result<(), RemoteError> {
        debug!("Favorite quantity is fixed, skipping update");
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remove(&self, item_id: RemoteItemId) -> Result<(), RemoteError> {
        let request = self
            .api
            .authenticated(Method::DELETE, &format!("favorites/{item_id}"))?;
        self.api.execute(request).await.map(drop)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), RemoteError> {
        let request = self.api.authenticated(Method::DELETE, "favorites")?;
        self.api.execute(request).await.map(drop)
    }
}
