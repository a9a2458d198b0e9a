//! Cart and favorites items.
//!
//! Two shapes exist for the same concept:
//!
//! - [`LocalItem`] lives in guest storage and carries a cached copy of the
//!   product's display data, which may be stale.
//! - [`RemoteItem`] is returned by the backend for an authenticated user and
//!   always reflects server truth.
//!
//! Both project into [`ItemView`], which is what callers render.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, RemoteItemId};
use super::money::Discount;

/// Product display data captured when a guest adds an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySnapshot {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percent: Discount,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A catalog product as returned by `GET /products/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percent: Discount,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: Option<u32>,
}

impl Product {
    /// Capture the fields a guest collection caches.
    #[must_use]
    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            name: self.name.clone(),
            price: self.price,
            discount_percent: self.discount_percent,
            image_url: self.image_url.clone(),
        }
    }
}

/// An entry of a guest collection, persisted as JSON in local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalItem {
    pub product_id: ProductId,
    /// Always 1 for favorites.
    pub quantity: u32,
    pub cached_name: String,
    pub cached_price: Decimal,
    #[serde(default)]
    pub cached_discount_percent: Discount,
    #[serde(default)]
    pub cached_image_url: Option<String>,
}

impl LocalItem {
    /// Create an item from a display snapshot.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: u32, snapshot: DisplaySnapshot) -> Self {
        Self {
            product_id,
            quantity,
            cached_name: snapshot.name,
            cached_price: snapshot.price,
            cached_discount_percent: snapshot.discount_percent,
            cached_image_url: snapshot.image_url,
        }
    }

    /// The cached display data.
    #[must_use]
    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            name: self.cached_name.clone(),
            price: self.cached_price,
            discount_percent: self.cached_discount_percent,
            image_url: self.cached_image_url.clone(),
        }
    }
}

/// A server-side cart line or favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub id: RemoteItemId,
    pub product_id: ProductId,
    /// Favorites responses omit the quantity.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percent: Discount,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: Option<u32>,
}

const fn default_quantity() -> u32 {
    1
}

/// Unified read model over local and remote items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub product_id: ProductId,
    /// Set only for items backed by the server.
    pub remote_id: Option<RemoteItemId>,
    pub quantity: u32,
    pub name: String,
    pub unit_price: Decimal,
    pub discount: Discount,
    pub image_url: Option<String>,
    /// Unknown for guest items.
    pub stock: Option<u32>,
}

impl ItemView {
    /// Discounted unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.discount.apply(self.unit_price) * Decimal::from(self.quantity)
    }
}

impl From<&LocalItem> for ItemView {
    fn from(item: &LocalItem) -> Self {
        Self {
            product_id: item.product_id,
            remote_id: None,
            quantity: item.quantity,
            name: item.cached_name.clone(),
            unit_price: item.cached_price,
            discount: item.cached_discount_percent,
            image_url: item.cached_image_url.clone(),
            stock: None,
        }
    }
}

impl From<&RemoteItem> for ItemView {
    fn from(item: &RemoteItem) -> Self {
        Self {
            product_id: item.product_id,
            remote_id: Some(item.id),
            quantity: item.quantity,
            name: item.name.clone(),
            unit_price: item.price,
            discount: item.discount_percent,
            image_url: item.image_url.clone(),
            stock: item.stock,
        }
    }
}
