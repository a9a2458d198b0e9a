//! Auth-aware cart and favorites.
//!
//! [`SyncedCollection`] is the one type callers talk to. Each operation picks
//! a backing store from the current session:
//!
//! - **Guest**: the [`LocalStore`], synchronously. Never fails, except that
//!   a new entry added by ID needs its display data looked up first.
//! - **Authenticated**: the [`RemoteStore`], followed by a full re-list. No
//!   optimistic update is applied. Failures are logged, announced through the
//!   [`Notifier`], and returned.
//!
//! Session transitions are fed in through
//! [`SyncedCollection::handle_session_change`], either directly or by a task
//! started with [`SyncedCollection::spawn_session_listener`]. Signing in
//! migrates guest entries to the account; signing out only forgets the
//! server view, the guest record stays where it is.

use std::future::{self, Future};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use basket_core::{ItemView, LocalItem, Product, ProductId, RemoteItem, RemoteItemId};

use crate::error::{Error, Result};
use crate::kind::{self, Cart, CollectionKind, Favorites};
use crate::local::LocalStore;
use crate::notify::Notifier;
use crate::reconcile::{self, ReconcileReport};
use crate::remote::{RemoteError, RemoteStore};
use crate::session::SessionState;
use crate::storage::Storage;

/// What subscribers render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSnapshot {
    pub authenticated: bool,
    pub items: Vec<ItemView>,
    pub total: u32,
}

#[derive(Default)]
struct RemoteView {
    authenticated: bool,
    items: Vec<RemoteItem>,
}

/// A cart or favorites list that follows the session.
pub struct SyncedCollection<K, S, R> {
    local: Mutex<LocalStore<K, S>>,
    remote: R,
    notifier: Notifier,
    view: Mutex<RemoteView>,
    snapshots: watch::Sender<CollectionSnapshot>,
}

impl<K: CollectionKind, S: Storage, R: RemoteStore> SyncedCollection<K, S, R> {
    /// Create a collection in guest mode.
    pub fn new(local: LocalStore<K, S>, remote: R, notifier: Notifier) -> Self {
        let initial = CollectionSnapshot {
            authenticated: false,
            items: local.items().iter().map(ItemView::from).collect(),
            total: local.total(),
        };
        let (snapshots, _rx) = watch::channel(initial);

        Self {
            local: Mutex::new(local),
            remote,
            notifier,
            view: Mutex::new(RemoteView::default()),
            snapshots,
        }
    }

    fn local(&self) -> MutexGuard<'_, LocalStore<K, S>> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn view(&self) -> MutexGuard<'_, RemoteView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Whether operations currently go to the server.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.view().authenticated
    }

    /// Current entries.
    #[must_use]
    pub fn items(&self) -> Vec<ItemView> {
        {
            let view = self.view();
            if view.authenticated {
                return view.items.iter().map(ItemView::from).collect();
            }
        }
        self.local().items().iter().map(ItemView::from).collect()
    }

    /// Sum of quantities (cart) or number of entries (favorites).
    #[must_use]
    pub fn total(&self) -> u32 {
        {
            let view = self.view();
            if view.authenticated {
                return kind::total::<K>(view.items.iter().map(|i| i.quantity));
            }
        }
        self.local().total()
    }

    /// Quantity held of a product, 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        {
            let view = self.view();
            if view.authenticated {
                return view
                    .items
                    .iter()
                    .find(|i| i.product_id == product_id)
                    .map_or(0, |i| i.quantity);
            }
        }
        self.local().get(product_id).map_or(0, |i| i.quantity)
    }

    /// Whether a product has an entry.
    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.quantity_of(product_id) > 0
    }

    /// Observe snapshots, published after every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.snapshots.subscribe()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a product.
    ///
    /// # Errors
    ///
    /// Returns an error only when authenticated and the server call or the
    /// follow-up refresh fails.
    pub async fn add_item(&self, product: &Product, quantity: u32) -> Result<()> {
        let product = product.clone();
        self.add_by_id(product.id, quantity, move |_| future::ready(Ok(product))).await
    }

    /// Add `quantity` of a product known only by ID.
    ///
    /// The server needs nothing but the ID. A new guest entry caches display
    /// data, so it is fetched with `lookup` first; an existing guest entry
    /// keeps the snapshot it already has.
    ///
    /// # Errors
    ///
    /// Returns the server error when authenticated, or the `lookup` error
    /// for a new guest entry. Both are logged and announced.
    #[instrument(skip(self, lookup), fields(collection = K::LABEL))]
    pub async fn add_by_id<F, Fut>(
        &self,
        product_id: ProductId,
        quantity: u32,
        lookup: F,
    ) -> Result<()>
    where
        F: FnOnce(ProductId) -> Fut + Send,
        Fut: Future<Output = std::result::Result<Product, RemoteError>> + Send,
    {
        if quantity == 0 {
            return Ok(());
        }
        if self.is_authenticated() {
            return self.mutate_remote("add item to", self.remote.add(product_id, quantity)).await;
        }

        let cached = self.local().get(product_id).map(LocalItem::snapshot);
        let snapshot = match cached {
            Some(snapshot) => snapshot,
            None => match lookup(product_id).await {
                Ok(product) => product.snapshot(),
                Err(e) => return Err(self.report("add item to", e.into())),
            },
        };
        self.local().add(product_id, quantity, snapshot);
        self.publish();
        Ok(())
    }

    /// Set the quantity of a product's entry; zero removes it. Favorites
    /// stay at 1.
    ///
    /// # Errors
    ///
    /// When authenticated, returns `Error::NotInCollection` if the product
    /// has no entry, or the server error.
    #[instrument(skip(self), fields(collection = K::LABEL))]
    pub async fn update_item(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return self.remove_item(product_id).await;
        }
        if !self.is_authenticated() {
            self.local().set_quantity(product_id, quantity);
            self.publish();
            return Ok(());
        }

        let Some(item_id) = self.remote_id(product_id) else {
            return Err(self.report(
                "update item in",
                Error::NotInCollection {
                    collection: K::LABEL,
                    product_id,
                },
            ));
        };
        self.mutate_remote("update item in", self.remote.update(item_id, quantity)).await
    }

    /// Remove a product's entry. Removing an absent product does nothing.
    ///
    /// # Errors
    ///
    /// Returns the server error when authenticated.
    #[instrument(skip(self), fields(collection = K::LABEL))]
    pub async fn remove_item(&self, product_id: ProductId) -> Result<()> {
        if !self.is_authenticated() {
            self.local().remove(product_id);
            self.publish();
            return Ok(());
        }

        let Some(item_id) = self.remote_id(product_id) else {
            return Ok(());
        };
        self.mutate_remote("remove item from", self.remote.remove(item_id)).await
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns the server error when authenticated.
    #[instrument(skip(self), fields(collection = K::LABEL))]
    pub async fn clear(&self) -> Result<()> {
        if !self.is_authenticated() {
            self.local().clear();
            self.publish();
            return Ok(());
        }
        self.mutate_remote("clear", self.remote.clear()).await
    }

    /// Reload the server view. Guests just re-publish local state.
    ///
    /// # Errors
    ///
    /// Returns the server error when authenticated.
    pub async fn refresh(&self) -> Result<()> {
        if !self.is_authenticated() {
            self.publish();
            return Ok(());
        }
        self.refresh_remote().await
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// React to a session state.
    ///
    /// Guest → authenticated runs the reconciliation and loads the server
    /// view. Authenticated → guest drops the server view. Any other
    /// combination, including a repeat of the current state, does nothing.
    ///
    /// Returns the reconciliation report when guest entries were migrated.
    ///
    /// # Errors
    ///
    /// Returns the server error if loading the server view after sign-in
    /// fails (only when there was nothing to migrate; a failed refresh
    /// during migration is announced but not returned).
    pub async fn handle_session_change(
        &self,
        state: &SessionState,
    ) -> Result<Option<ReconcileReport>> {
        let now_authenticated = state.is_authenticated();
        let was_authenticated = {
            let mut view = self.view();
            std::mem::replace(&mut view.authenticated, now_authenticated)
        };

        match (was_authenticated, now_authenticated) {
            (false, true) => {
                info!(collection = K::LABEL, "Session authenticated");
                match self.reconcile().await {
                    Some(report) => Ok(Some(report)),
                    None => self.refresh_remote().await.map(|()| None),
                }
            }
            (true, false) => {
                info!(collection = K::LABEL, "Session ended, showing guest collection");
                self.view().items.clear();
                self.publish();
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Follow session changes on a background task.
    ///
    /// The current state is handled immediately. The task ends when the
    /// session sender is dropped.
    pub fn spawn_session_listener(
        self: Arc<Self>,
        mut session: watch::Receiver<SessionState>,
    ) -> JoinHandle<()>
    where
        S: 'static,
        R: 'static,
    {
        tokio::spawn(async move {
            loop {
                let state = session.borrow_and_update().clone();
                if let Err(e) = self.handle_session_change(&state).await {
                    // Already logged and announced by the failing operation
                    debug!(collection = K::LABEL, error = %e, "Session change left view stale");
                }
                if session.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Migrate guest entries to the account.
    ///
    /// Entries the server rejects are dropped with the rest of the guest
    /// record, and the user is told the sync succeeded either way.
    async fn reconcile(&self) -> Option<ReconcileReport> {
        let items = {
            let local = self.local();
            if local.is_empty() {
                return None;
            }
            local.items().to_vec()
        };

        let report = reconcile::push_items(K::LABEL, &items, &self.remote).await;
        self.local().clear();

        // A failure here is already announced; the migration itself is done
        let _ = self.refresh_remote().await;

        self.notifier.success(format!("Your guest {} was saved to your account", K::LABEL));
        Some(report)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn remote_id(&self, product_id: ProductId) -> Option<RemoteItemId> {
        self.view()
            .items
            .iter()
            .find(|i| i.product_id == product_id)
            .map(|i| i.id)
    }

    /// Await a server mutation, then re-list.
    async fn mutate_remote<F>(&self, action: &'static str, call: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<(), RemoteError>> + Send,
    {
        if let Err(e) = call.await {
            return Err(self.report(action, e.into()));
        }
        self.refresh_remote().await
    }

    async fn refresh_remote(&self) -> Result<()> {
        match self.remote.list().await {
            Ok(items) => {
                {
                    let mut view = self.view();
                    // Signed out while the request was in flight
                    if !view.authenticated {
                        return Ok(());
                    }
                    view.items = items;
                }
                self.publish();
                Ok(())
            }
            Err(e) => Err(self.report("load", e.into())),
        }
    }

    fn report(&self, action: &str, err: Error) -> Error {
        error!(
            collection = K::LABEL,
            action,
            error = %err,
            "Collection operation failed"
        );
        self.notifier.error(format!("Could not {action} {}: {err}", K::LABEL));
        err
    }

    fn publish(&self) {
        let snapshot = CollectionSnapshot {
            authenticated: self.is_authenticated(),
            items: self.items(),
            total: self.total(),
        };
        self.snapshots.send_replace(snapshot);
    }
}

impl<S: Storage, R: RemoteStore> SyncedCollection<Cart, S, R> {
    /// Sum of discounted line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items().iter().map(ItemView::line_total).sum()
    }
}

impl<S: Storage, R: RemoteStore> SyncedCollection<Favorites, S, R> {
    #[must_use]
    pub fn is_favorite(&self, product_id: ProductId) -> bool {
        self.contains(product_id)
    }

    /// Add the product if absent, remove it if present.
    ///
    /// Removal goes by ID alone, so a favorite whose product is no longer
    /// listed can still be toggled off. `lookup` is used only when adding,
    /// as in [`Self::add_by_id`].
    ///
    /// Returns whether the product is a favorite afterwards.
    ///
    /// # Errors
    ///
    /// Returns the server error when authenticated, or the lookup error.
    pub async fn toggle<F, Fut>(&self, product_id: ProductId, lookup: F) -> Result<bool>
    where
        F: FnOnce(ProductId) -> Fut + Send,
        Fut: Future<Output = std::result::Result<Product, RemoteError>> + Send,
    {
        if self.contains(product_id) {
            self.remove_item(product_id).await?;
            Ok(false)
        } else {
            self.add_by_id(product_id, 1, lookup).await?;
            Ok(true)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use basket_core::wire::Account;
    use basket_core::{Discount, Email, UserId};
    use secrecy::SecretString;

    use super::*;
    use crate::notify::{Notice, NoticeLevel};
    use crate::session::{AuthSession, SessionHandle};
    use crate::storage::MemoryStorage;
    use crate::testing::MemoryRemote;

    type TestCart = SyncedCollection<Cart, MemoryStorage, Arc<MemoryRemote>>;

    struct Fixture {
        storage: Arc<MemoryStorage>,
        remote: Arc<MemoryRemote>,
        notifier: Notifier,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                storage: Arc::new(MemoryStorage::new()),
                remote: Arc::new(MemoryRemote::new()),
                notifier: Notifier::new(),
            }
        }

        fn cart(&self) -> TestCart {
            SyncedCollection::new(
                LocalStore::load(Arc::clone(&self.storage)),
                Arc::clone(&self.remote),
                self.notifier.clone(),
            )
        }

        fn favorites(&self) -> SyncedCollection<Favorites, MemoryStorage, Arc<MemoryRemote>> {
            SyncedCollection::new(
                LocalStore::load(Arc::clone(&self.storage)),
                Arc::clone(&self.remote),
                self.notifier.clone(),
            )
        }
    }

    fn product(id: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Decimal::new(1000, 2),
            discount_percent: Discount::new(10).unwrap(),
            image_url: None,
            stock: Some(5),
        }
    }

    fn listed(id: ProductId) -> future::Ready<std::result::Result<Product, RemoteError>> {
        future::ready(Ok(product(id.as_i32())))
    }

    fn unlisted(id: ProductId) -> future::Ready<std::result::Result<Product, RemoteError>> {
        future::ready(Err(RemoteError::NotFound(format!("product {id}"))))
    }

    fn auth_session() -> AuthSession {
        AuthSession::new(
            Account {
                id: UserId::new(1),
                email: Email::parse("shopper@example.com").unwrap(),
            },
            SecretString::from("token"),
        )
    }

    fn signed_in() -> SessionState {
        SessionState::Authenticated(auth_session())
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Notice>) -> Vec<Notice> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_guest_operations_stay_local() {
        let fx = Fixture::new();
        let cart = fx.cart();

        cart.add_item(&product(42), 1).await.unwrap();
        cart.add_item(&product(42), 1).await.unwrap();
        cart.add_item(&product(7), 3).await.unwrap();
        cart.update_item(ProductId::new(7), 1).await.unwrap();

        assert_eq!(cart.quantity_of(ProductId::new(42)), 2);
        assert_eq!(cart.total(), 3);
        assert!(fx.remote.add_calls().is_empty());
        assert!(fx.storage.contains(Cart::STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_guest_operations_never_fail_when_server_is_down() {
        let fx = Fixture::new();
        fx.remote.set_offline(true);
        let cart = fx.cart();

        assert!(cart.add_item(&product(1), 1).await.is_ok());
        assert!(cart.remove_item(ProductId::new(1)).await.is_ok());
        assert!(cart.clear().await.is_ok());
        assert!(cart.refresh().await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_migrates_guest_items() {
        let fx = Fixture::new();
        let cart = fx.cart();
        let mut notices = fx.notifier.subscribe();
        cart.add_item(&product(1), 1).await.unwrap();
        cart.add_item(&product(2), 2).await.unwrap();

        let report = cart.handle_session_change(&signed_in()).await.unwrap();

        assert_eq!(report.unwrap().pushed, 2);
        assert!(!fx.storage.contains(Cart::STORAGE_KEY));
        let listed: Vec<i32> = cart.items().iter().map(|i| i.product_id.as_i32()).collect();
        assert_eq!(listed, vec![1, 2]);
        assert_eq!(cart.total(), 3);

        let notices = drain(&mut notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_rejected_item_is_lost_and_sync_still_reported() {
        let fx = Fixture::new();
        fx.remote.reject(ProductId::new(2));
        let cart = fx.cart();
        let mut notices = fx.notifier.subscribe();
        for id in 1..=3 {
            cart.add_item(&product(id), 1).await.unwrap();
        }

        let report = cart
            .handle_session_change(&signed_in())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.failed, vec![ProductId::new(2)]);
        assert!(!fx.storage.contains(Cart::STORAGE_KEY));
        assert!(!cart.contains(ProductId::new(2)));
        assert_eq!(fx.remote.quantities(), vec![(1, 1), (3, 1)]);

        let levels: Vec<NoticeLevel> = drain(&mut notices).iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NoticeLevel::Success]);
    }

    #[tokio::test]
    async fn test_sign_in_with_empty_guest_collection_only_loads() {
        let fx = Fixture::new();
        let cart = fx.cart();
        let mut notices = fx.notifier.subscribe();

        let report = cart.handle_session_change(&signed_in()).await.unwrap();

        assert!(report.is_none());
        assert!(cart.is_authenticated());
        assert!(fx.remote.add_calls().is_empty());
        assert!(drain(&mut notices).is_empty());
    }

    #[tokio::test]
    async fn test_repeated_sign_in_does_not_reconcile_twice() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.add_item(&product(1), 1).await.unwrap();

        cart.handle_session_change(&signed_in()).await.unwrap();
        let second = cart.handle_session_change(&signed_in()).await.unwrap();

        assert!(second.is_none());
        assert_eq!(fx.remote.add_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_authenticated_operations_go_remote_and_refresh() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.handle_session_change(&signed_in()).await.unwrap();

        cart.add_item(&product(5), 2).await.unwrap();
        assert_eq!(cart.quantity_of(ProductId::new(5)), 2);

        cart.update_item(ProductId::new(5), 4).await.unwrap();
        assert_eq!(fx.remote.quantities(), vec![(5, 4)]);
        assert_eq!(cart.total(), 4);

        cart.update_item(ProductId::new(5), 0).await.unwrap();
        assert!(fx.remote.quantities().is_empty());
        assert!(!fx.storage.contains(Cart::STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_authenticated_failure_is_raised_and_announced() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.handle_session_change(&signed_in()).await.unwrap();
        fx.remote.set_offline(true);
        let mut notices = fx.notifier.subscribe();

        let err = cart.add_item(&product(1), 1).await.unwrap_err();

        assert!(matches!(err, Error::Remote(RemoteError::Api { status: 503, .. })));
        let notices = drain(&mut notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(!fx.storage.contains(Cart::STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_update_unknown_item_when_authenticated() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.handle_session_change(&signed_in()).await.unwrap();

        let err = cart.update_item(ProductId::new(9), 2).await.unwrap_err();
        assert!(matches!(err, Error::NotInCollection { .. }));

        // Removing an absent product is not an error
        assert!(cart.remove_item(ProductId::new(9)).await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_out_keeps_guest_record() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.handle_session_change(&signed_in()).await.unwrap();
        cart.add_item(&product(3), 1).await.unwrap();

        cart.handle_session_change(&SessionState::Guest).await.unwrap();

        assert!(!cart.is_authenticated());
        assert!(cart.items().is_empty());

        // Guest adds after sign-out land locally again
        cart.add_item(&product(4), 1).await.unwrap();
        assert!(fx.storage.contains(Cart::STORAGE_KEY));
        assert_eq!(fx.remote.quantities(), vec![(3, 1)]);
    }

    #[tokio::test]
    async fn test_subtotal_applies_discounts() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.add_item(&product(1), 2).await.unwrap();
        cart.add_item(&product(2), 1).await.unwrap();

        // 10.00 less 10% = 9.00, three units
        assert_eq!(cart.subtotal(), Decimal::new(2700, 2));
    }

    #[tokio::test]
    async fn test_favorites_toggle_and_total() {
        let fx = Fixture::new();
        let favorites = fx.favorites();

        assert!(favorites.toggle(ProductId::new(1), listed).await.unwrap());
        assert!(favorites.toggle(ProductId::new(2), listed).await.unwrap());
        assert!(favorites.is_favorite(ProductId::new(1)));
        assert_eq!(favorites.total(), 2);

        assert!(!favorites.toggle(ProductId::new(1), listed).await.unwrap());
        assert!(!favorites.is_favorite(ProductId::new(1)));
        assert_eq!(favorites.total(), 1);
    }

    #[tokio::test]
    async fn test_unlisted_favorite_toggles_off() {
        let fx = Fixture::new();
        let favorites = fx.favorites();
        favorites.add_item(&product(500), 1).await.unwrap();

        assert!(!favorites.toggle(ProductId::new(500), unlisted).await.unwrap());
        assert!(!favorites.is_favorite(ProductId::new(500)));
        assert_eq!(favorites.total(), 0);

        favorites.handle_session_change(&signed_in()).await.unwrap();
        favorites.add_item(&product(501), 1).await.unwrap();
        assert!(!favorites.toggle(ProductId::new(501), unlisted).await.unwrap());
        assert!(fx.remote.quantities().is_empty());
    }

    #[tokio::test]
    async fn test_authenticated_add_by_id_skips_lookup() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.handle_session_change(&signed_in()).await.unwrap();
        let mut notices = fx.notifier.subscribe();

        cart.add_by_id(ProductId::new(500), 2, unlisted).await.unwrap();

        assert_eq!(fx.remote.quantities(), vec![(500, 2)]);
        assert_eq!(cart.quantity_of(ProductId::new(500)), 2);
        assert!(drain(&mut notices).is_empty());
    }

    #[tokio::test]
    async fn test_guest_lookup_failure_is_raised_and_announced() {
        let fx = Fixture::new();
        let cart = fx.cart();
        let mut notices = fx.notifier.subscribe();

        let err = cart.add_by_id(ProductId::new(9), 1, unlisted).await.unwrap_err();

        assert!(matches!(err, Error::Remote(RemoteError::NotFound(_))));
        let notices = drain(&mut notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("cart"));
        assert_eq!(cart.total(), 0);
        assert!(!fx.storage.contains(Cart::STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_guest_add_to_existing_entry_keeps_snapshot() {
        let fx = Fixture::new();
        let cart = fx.cart();
        cart.add_item(&product(3), 1).await.unwrap();

        cart.add_by_id(ProductId::new(3), 2, unlisted).await.unwrap();

        assert_eq!(cart.quantity_of(ProductId::new(3)), 3);
        assert_eq!(cart.items()[0].name, "Product 3");
    }

    #[tokio::test]
    async fn test_snapshots_follow_changes() {
        let fx = Fixture::new();
        let cart = fx.cart();
        let mut rx = cart.subscribe();

        cart.add_item(&product(1), 2).await.unwrap();

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert!(!snapshot.authenticated);
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.items.len(), 1);
    }

    #[tokio::test]
    async fn test_session_listener_reconciles_on_sign_in() {
        let fx = Fixture::new();
        let cart = Arc::new(fx.cart());
        cart.add_item(&product(8), 1).await.unwrap();
        let session = SessionHandle::new();
        let mut snapshots = cart.subscribe();

        let task = Arc::clone(&cart).spawn_session_listener(session.subscribe());
        session.sign_in(auth_session());

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let authenticated = snapshots.borrow_and_update().authenticated;
                if authenticated && fx.remote.quantities() == vec![(8, 1)] {
                    break;
                }
                snapshots.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        assert!(!fx.storage.contains(Cart::STORAGE_KEY));
        drop(session);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
