//! Storefront REST API clients.
//!
//! # Architecture
//!
//! - [`ApiClient`] owns the shared `reqwest` client, the base URL and a view
//!   of the current session, from which it takes the bearer token
//! - [`RestCart`] and [`RestFavorites`] implement [`RemoteStore`], one REST
//!   call per operation
//! - [`Catalog`] looks products up by ID, cached via `moka` (5 minute TTL)
//!
//! The backend is the source of truth for authenticated collections. Nothing
//! in this module caches collection contents; the facade re-lists after every
//! mutation.

mod auth;
mod catalog;
mod client;
mod collections;

use std::future::Future;

use basket_core::{ProductId, RemoteItem, RemoteItemId};
use thiserror::Error;

pub use catalog::Catalog;
pub use client::ApiClient;
pub use collections::{RestCart, RestFavorites};

/// Errors that can occur when calling the storefront API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The operation needs a session and there is none.
    #[error("no authenticated session")]
    NotAuthenticated,

    /// The backend rejected the session token.
    #[error("session rejected by the server")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Server-side collection operations, one REST call each.
pub trait RemoteStore: Send + Sync {
    /// List every item in the collection.
    fn list(&self) -> impl Future<Output = Result<Vec<RemoteItem>, RemoteError>> + Send;

    /// Add a product. The server merges it into an existing entry.
    fn add(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Set the quantity of an existing item.
    fn update(
        &self,
        item_id: RemoteItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Remove an item.
    fn remove(&self, item_id: RemoteItemId) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Remove every item.
    fn clear(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

impl<T: RemoteStore> RemoteStore for std::sync::Arc<T> {
    fn list(&self) -> impl Future<Output = Result<Vec<RemoteItem>, RemoteError>> + Send {
        (**self).list()
    }

    fn add(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).add(product_id, quantity)
    }

    fn update(
        &self,
        item_id: RemoteItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).update(item_id, quantity)
    }

    fn remove(&self, item_id: RemoteItemId) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).remove(item_id)
    }

    fn clear(&self) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).clear()
    }
}
