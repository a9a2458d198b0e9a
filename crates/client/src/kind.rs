//! Collection kinds.
//!
//! The cart and the favorites list share all of their machinery. The marker
//! types here carry the few differences: storage key, label, and whether
//! entries have a meaningful quantity.

/// Static description of a synchronized collection.
pub trait CollectionKind: Send + Sync + 'static {
    /// Key of the guest storage record.
    const STORAGE_KEY: &'static str;

    /// Human-readable name used in logs and notifications.
    const LABEL: &'static str;

    /// Cart entries carry quantities that accumulate and sum into the total.
    /// Favorites hold each product at most once and the total counts entries.
    const HAS_QUANTITY: bool;
}

/// The shopping cart.
#[derive(Debug, Clone, Copy)]
pub enum Cart {}

/// The favorites list.
#[derive(Debug, Clone, Copy)]
pub enum Favorites {}

impl CollectionKind for Cart {
    const STORAGE_KEY: &'static str = "basket.cart";
    const LABEL: &'static str = "cart";
    const HAS_QUANTITY: bool = true;
}

impl CollectionKind for Favorites {
    const STORAGE_KEY: &'static str = "basket.favorites";
    const LABEL: &'static str = "favorites";
    const HAS_QUANTITY: bool = false;
}

/// Total of a collection given its entries' quantities.
pub(crate) fn total<K: CollectionKind>(quantities: impl Iterator<Item = u32>) -> u32 {
    if K::HAS_QUANTITY {
        quantities.fold(0, u32::saturating_add)
    } else {
        u32::try_from(quantities.count()).unwrap_or(u32::MAX)
    }
}
