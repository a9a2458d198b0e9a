//! In-memory `RemoteStore` for unit tests.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use basket_core::{ProductId, RemoteItem, RemoteItemId};
use rust_decimal::Decimal;

use crate::remote::{RemoteError, RemoteStore};

#[derive(Default)]
struct State {
    items: Vec<RemoteItem>,
    next_id: i32,
    rejected: HashSet<ProductId>,
    add_calls: Vec<ProductId>,
    offline: bool,
}

/// Accepts every call unless told otherwise.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every `add` of this product.
    pub fn reject(&self, product_id: ProductId) {
        self.state().rejected.insert(product_id);
    }

    /// Fail every call.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// `(product_id, quantity)` pairs in insertion order.
    pub fn quantities(&self) -> Vec<(i32, u32)> {
        self.state()
            .items
            .iter()
            .map(|i| (i.product_id.as_i32(), i.quantity))
            .collect()
    }

    pub fn add_calls(&self) -> Vec<ProductId> {
        self.state().add_calls.clone()
    }

    fn check_online(state: &State) -> Result<(), RemoteError> {
        if state.offline {
            return Err(RemoteError::Api {
                status: 503,
                message: "offline".to_string(),
            });
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    async fn list(&self) -> Result<Vec<RemoteItem>, RemoteError> {
        let state = self.state();
        Self::check_online(&state)?;
        Ok(state.items.clone())
    }

    async fn add(&self, product_id: ProductId, quantity: u32) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.add_calls.push(product_id);
        Self::check_online(&state)?;
        if state.rejected.contains(&product_id) {
            return Err(RemoteError::Api {
                status: 422,
                message: format!("product {product_id} unavailable"),
            });
        }

        let state = &mut *state;
        if let Some(item) = state.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity += quantity;
        } else {
            state.next_id += 1;
            let id = RemoteItemId::new(state.next_id);
            state.items.push(RemoteItem {
                id,
                product_id,
                quantity,
                name: format!("Product {product_id}"),
                price: Decimal::new(250, 2),
                discount_percent: basket_core::Discount::NONE,
                image_url: None,
                stock: Some(10),
            });
        }
        Ok(())
    }

    async fn update(&self, item_id: RemoteItemId, quantity: u32) -> Result<(), RemoteError> {
        let mut state = self.state();
        Self::check_online(&state)?;
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| RemoteError::NotFound(format!("cart item {item_id}")))?;
        item.quantity = quantity;
        Ok(())
    }

    async fn remove(&self, item_id: RemoteItemId) -> Result<(), RemoteError> {
        let mut state = self.state();
        Self::check_online(&state)?;
        state.items.retain(|i| i.id != item_id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), RemoteError> {
        let mut state = self.state();
        Self::check_online(&state)?;
        state.items.clear();
        Ok(())
    }
}
