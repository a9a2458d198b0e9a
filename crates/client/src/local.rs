//! Guest collection backed by durable storage.
//!
//! The whole collection is held in memory and the full JSON array is
//! rewritten to storage after every mutation. Nothing here returns an
//! error: unreadable records are discarded on load, and failed writes are
//! logged and otherwise ignored, so a guest can always keep shopping.

use std::marker::PhantomData;
use std::sync::Arc;

use basket_core::{DisplaySnapshot, LocalItem, ProductId};
use tracing::{debug, warn};

use crate::kind::{self, CollectionKind};
use crate::storage::Storage;

/// Guest-mode cart or favorites list.
pub struct LocalStore<K, S> {
    storage: Arc<S>,
    items: Vec<LocalItem>,
    kind: PhantomData<fn() -> K>,
}

impl<K: CollectionKind, S: Storage> LocalStore<K, S> {
    /// Hydrate the collection from storage.
    ///
    /// A record that fails to parse is deleted and the collection starts
    /// empty.
    pub fn load(storage: Arc<S>) -> Self {
        let items = match storage.read(K::STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<LocalItem>>(&raw) {
                Ok(items) => dedupe::<K>(items),
                Err(e) => {
                    warn!(
                        collection = K::LABEL,
                        error = %e,
                        "Discarding corrupt guest record"
                    );
                    if let Err(e) = storage.delete(K::STORAGE_KEY) {
                        warn!(collection = K::LABEL, error = %e, "Failed to delete corrupt guest record");
                    }
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(collection = K::LABEL, error = %e, "Failed to read guest record");
                Vec::new()
            }
        };

        debug!(collection = K::LABEL, items = items.len(), "Guest collection loaded");

        Self {
            storage,
            items,
            kind: PhantomData,
        }
    }

    /// Add `quantity` of a product.
    ///
    /// An existing cart entry has its quantity incremented; an existing
    /// favorite is left as is. A new entry caches `snapshot` for display.
    /// Adding zero does nothing.
    pub fn add(&mut self, product_id: ProductId, quantity: u32, snapshot: DisplaySnapshot) {
        if quantity == 0 {
            return;
        }

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            if !K::HAS_QUANTITY {
                return;
            }
            item.quantity = item.quantity.saturating_add(quantity);
        } else {
            let quantity = if K::HAS_QUANTITY { quantity } else { 1 };
            self.items.push(LocalItem::new(product_id, quantity, snapshot));
        }
        self.persist();
    }

    /// Set the quantity of an existing entry; zero removes it.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }

        let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) else {
            return;
        };
        let quantity = if K::HAS_QUANTITY { quantity } else { 1 };
        if item.quantity != quantity {
            item.quantity = quantity;
            self.persist();
        }
    }

    /// Remove the entry for a product, if any.
    pub fn remove(&mut self, product_id: ProductId) {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() != before {
            self.persist();
        }
    }

    /// Empty the collection and delete its storage record.
    pub fn clear(&mut self) {
        self.items.clear();
        if let Err(e) = self.storage.delete(K::STORAGE_KEY) {
            warn!(collection = K::LABEL, error = %e, "Failed to delete guest record");
        }
    }

    /// Sum of quantities (cart) or number of entries (favorites).
    #[must_use]
    pub fn total(&self) -> u32 {
        kind::total::<K>(self.items.iter().map(|i| i.quantity))
    }

    /// The entry for a product.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<&LocalItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Whether the product has an entry.
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LocalItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.items) {
            Ok(json) => json,
            Err(e) => {
                warn!(collection = K::LABEL, error = %e, "Failed to serialize guest record");
                return;
            }
        };
        if let Err(e) = self.storage.write(K::STORAGE_KEY, &json) {
            warn!(collection = K::LABEL, error = %e, "Failed to persist guest record");
        }
    }
}

/// Collapse duplicate product entries from a hand-edited or legacy record.
fn dedupe<K: CollectionKind>(items: Vec<LocalItem>) -> Vec<LocalItem> {
    let mut out: Vec<LocalItem> = Vec::with_capacity(items.len());
    for item in items {
        if let Some(existing) = out.iter_mut().find(|i| i.product_id == item.product_id) {
            if K::HAS_QUANTITY {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
        } else if item.quantity > 0 {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::kind::{Cart, Favorites};
    use crate::storage::{MemoryStorage, StorageError};

    /// Reads succeed, writes always fail.
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn write(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }

        fn delete(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }

    fn snapshot(name: &str) -> DisplaySnapshot {
        DisplaySnapshot {
            name: name.to_string(),
            price: Decimal::new(499, 2),
            discount_percent: basket_core::Discount::NONE,
            image_url: None,
        }
    }

    fn cart(storage: &Arc<MemoryStorage>) -> LocalStore<Cart, MemoryStorage> {
        LocalStore::load(Arc::clone(storage))
    }

    fn stored(storage: &MemoryStorage, key: &str) -> Vec<LocalItem> {
        serde_json::from_str(&storage.read(key).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_repeated_adds_sum_quantities() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = cart(&storage);

        for q in [1, 4, 2, 3] {
            store.add(ProductId::new(7), q, snapshot("Mango"));
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(ProductId::new(7)).unwrap().quantity, 10);
        assert_eq!(store.total(), 10);
    }

    #[test]
    fn test_guest_adds_product_42_twice() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = cart(&storage);

        store.add(ProductId::new(42), 1, snapshot("Pineapple"));
        store.add(ProductId::new(42), 1, snapshot("Pineapple"));

        let persisted = stored(&storage, Cart::STORAGE_KEY);
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].quantity, 2);
    }

    #[test]
    fn test_add_keeps_first_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = cart(&storage);

        store.add(ProductId::new(1), 1, snapshot("Old name"));
        store.add(ProductId::new(1), 1, snapshot("New name"));

        assert_eq!(store.get(ProductId::new(1)).unwrap().cached_name, "Old name");
    }

    #[test]
    fn test_add_zero_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = cart(&storage);

        store.add(ProductId::new(1), 0, snapshot("Kiwi"));

        assert!(store.is_empty());
        assert!(!storage.contains(Cart::STORAGE_KEY));
    }

    #[test]
    fn test_set_quantity_zero_equals_remove() {
        let storage_a = Arc::new(MemoryStorage::new());
        let storage_b = Arc::new(MemoryStorage::new());
        let mut a = cart(&storage_a);
        let mut b = cart(&storage_b);
        for store in [&mut a, &mut b] {
            store.add(ProductId::new(1), 2, snapshot("Kiwi"));
            store.add(ProductId::new(2), 1, snapshot("Lime"));
        }

        a.set_quantity(ProductId::new(1), 0);
        b.remove(ProductId::new(1));

        assert_eq!(a.items(), b.items());
        assert_eq!(
            stored(&storage_a, Cart::STORAGE_KEY),
            stored(&storage_b, Cart::STORAGE_KEY)
        );
    }

    #[test]
    fn test_failed_writes_keep_in_memory_state() {
        let mut store: LocalStore<Cart, _> = LocalStore::load(Arc::new(ReadOnlyStorage));

        store.add(ProductId::new(1), 2, snapshot("Kiwi"));
        store.set_quantity(ProductId::new(1), 4);
        store.add(ProductId::new(2), 1, snapshot("Lime"));
        store.remove(ProductId::new(2));

        assert_eq!(store.len(), 1);
        assert_eq!(store.total(), 4);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_quantity_updates_and_ignores_unknown() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = cart(&storage);
        store.add(ProductId::new(1), 2, snapshot("Kiwi"));

        store.set_quantity(ProductId::new(1), 5);
        store.set_quantity(ProductId::new(99), 3);

        assert_eq!(store.total(), 5);
        assert!(!store.contains(ProductId::new(99)));
        assert_eq!(stored(&storage, Cart::STORAGE_KEY)[0].quantity, 5);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = cart(&storage);
        store.remove(ProductId::new(3));
        assert!(!storage.contains(Cart::STORAGE_KEY));
    }

    #[test]
    fn test_clear_deletes_record() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = cart(&storage);
        store.add(ProductId::new(1), 2, snapshot("Kiwi"));
        assert!(storage.contains(Cart::STORAGE_KEY));

        store.clear();

        assert_eq!(store.total(), 0);
        assert!(!storage.contains(Cart::STORAGE_KEY));
    }

    #[test]
    fn test_load_hydrates_persisted_items() {
        let storage = Arc::new(MemoryStorage::new());
        cart(&storage).add(ProductId::new(5), 3, snapshot("Coconut"));

        let reloaded = cart(&storage);

        assert_eq!(reloaded.total(), 3);
        assert_eq!(reloaded.get(ProductId::new(5)).unwrap().cached_name, "Coconut");
    }

    #[test]
    fn test_load_discards_corrupt_record() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(Cart::STORAGE_KEY, "{not json").unwrap();

        let store = cart(&storage);

        assert!(store.is_empty());
        assert!(!storage.contains(Cart::STORAGE_KEY));
    }

    #[test]
    fn test_load_merges_duplicate_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let raw = r#"[
            {"productId":1,"quantity":2,"cachedName":"A","cachedPrice":"1.00"},
            {"productId":1,"quantity":3,"cachedName":"A","cachedPrice":"1.00"},
            {"productId":2,"quantity":0,"cachedName":"B","cachedPrice":"1.00"}
        ]"#;
        storage.write(Cart::STORAGE_KEY, raw).unwrap();

        let store = cart(&storage);

        assert_eq!(store.len(), 1);
        assert_eq!(store.total(), 5);
    }

    #[test]
    fn test_cart_and_favorites_use_separate_records() {
        let storage = Arc::new(MemoryStorage::new());
        let mut carts = cart(&storage);
        let mut favorites: LocalStore<Favorites, _> = LocalStore::load(Arc::clone(&storage));

        carts.add(ProductId::new(1), 1, snapshot("A"));
        favorites.add(ProductId::new(2), 1, snapshot("B"));
        carts.clear();

        assert!(!storage.contains(Cart::STORAGE_KEY));
        assert!(storage.contains(Favorites::STORAGE_KEY));
    }

    #[test]
    fn test_favorites_hold_each_product_once() {
        let storage = Arc::new(MemoryStorage::new());
        let mut favorites: LocalStore<Favorites, _> = LocalStore::load(Arc::clone(&storage));

        favorites.add(ProductId::new(1), 1, snapshot("A"));
        favorites.add(ProductId::new(1), 1, snapshot("A"));
        favorites.add(ProductId::new(2), 5, snapshot("B"));

        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites.total(), 2);
        assert_eq!(favorites.get(ProductId::new(2)).unwrap().quantity, 1);
    }
}
