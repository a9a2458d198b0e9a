//! Integration tests for Basket.
//!
//! Provides [`MockBackend`], an in-process storefront REST API served by
//! axum on an ephemeral port, so the client can be exercised end to end
//! without external services.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p basket-integration-tests
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let backend = MockBackend::start().await?;
//! let storefront = Storefront::new(backend.config()?, Arc::new(MemoryStorage::new()))?;
//! storefront.add_to_cart(ProductId::new(1), 2).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod routes;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use basket_client::{ClientConfig, ConfigError, MemoryStorage, Storefront};
use basket_core::{Discount, Email, Product, ProductId, RemoteItem, RemoteItemId, UserId};
use rust_decimal::Decimal;
use tokio::net::TcpListener;

/// Email of the account every backend starts with.
pub const SHOPPER_EMAIL: &str = "shopper@example.com";

/// Password of [`SHOPPER_EMAIL`].
pub const SHOPPER_PASSWORD: &str = "correct-horse-battery";

/// Build a catalog product.
#[must_use]
pub fn product(id: i32, name: &str, price_cents: i64, discount: Discount) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        price: Decimal::new(price_cents, 2),
        discount_percent: discount,
        image_url: Some(format!("https://cdn.example.com/products/{id}.jpg")),
        stock: Some(100),
    }
}

struct User {
    id: UserId,
    email: Email,
    password: String,
}

#[derive(Default)]
pub(crate) struct BackendState {
    products: HashMap<ProductId, Product>,
    users: Vec<User>,
    tokens: HashMap<String, UserId>,
    carts: HashMap<UserId, Vec<RemoteItem>>,
    favorites: HashMap<UserId, Vec<RemoteItem>>,
    rejected: HashSet<ProductId>,
    offline: bool,
    next_user_id: i32,
    next_item_id: i32,
    logins: usize,
}

impl BackendState {
    fn add_user(&mut self, email: Email, password: &str) -> UserId {
        self.next_user_id += 1;
        let id = UserId::new(self.next_user_id);
        self.users.push(User {
            id,
            email,
            password: password.to_string(),
        });
        id
    }

    fn user_id(&self, email: &str) -> Option<UserId> {
        self.users
            .iter()
            .find(|u| u.email.as_str() == email)
            .map(|u| u.id)
    }

    fn next_item_id(&mut self) -> RemoteItemId {
        self.next_item_id += 1;
        RemoteItemId::new(self.next_item_id)
    }

    /// Catalog entry as a collection item.
    fn item(&mut self, product: &Product, quantity: u32) -> RemoteItem {
        RemoteItem {
            id: self.next_item_id(),
            product_id: product.id,
            quantity,
            name: product.name.clone(),
            price: product.price,
            discount_percent: product.discount_percent,
            image_url: product.image_url.clone(),
            stock: product.stock,
        }
    }
}

pub(crate) type Shared = Arc<Mutex<BackendState>>;

pub(crate) fn lock(state: &Shared) -> MutexGuard<'_, BackendState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process storefront backend.
///
/// Serves the REST API under `/api` until the test's runtime shuts down.
#[derive(Clone)]
pub struct MockBackend {
    state: Shared,
    addr: SocketAddr,
}

impl MockBackend {
    /// Start a backend with a small catalog and one account
    /// ([`SHOPPER_EMAIL`] / [`SHOPPER_PASSWORD`]).
    ///
    /// Products: 1 "Pineapple Tee" $25.00, 2 "Trail Mix" $4.50 at 10% off,
    /// 3 "Enamel Mug" $12.00, 42 "Water Bottle" $18.00.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        let mut state = BackendState::default();
        for product in [
            product(1, "Pineapple Tee", 2500, Discount::NONE),
            product(2, "Trail Mix", 450, Discount::new(10).unwrap_or_default()),
            product(3, "Enamel Mug", 1200, Discount::NONE),
            product(42, "Water Bottle", 1800, Discount::NONE),
        ] {
            state.products.insert(product.id, product);
        }
        let shopper = Email::parse(SHOPPER_EMAIL)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        state.add_user(shopper, SHOPPER_PASSWORD);

        let state: Shared = Arc::new(Mutex::new(state));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let app = routes::router(Arc::clone(&state));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });

        tracing::debug!(%addr, "Mock backend listening");
        Ok(Self { state, addr })
    }

    /// API base URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is rejected.
    pub fn config(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfig::for_api_url(&self.url())
    }

    /// A guest storefront against this backend on top of `storage`.
    ///
    /// Building a second one on the same storage simulates a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn storefront(
        &self,
        storage: Arc<MemoryStorage>,
    ) -> basket_client::Result<Storefront<MemoryStorage>> {
        Storefront::new(self.config()?, storage)
    }

    /// List a product in the catalog.
    pub fn add_product(&self, product: Product) {
        lock(&self.state).products.insert(product.id, product);
    }

    /// Take a product out of the catalog. Existing cart and favorites
    /// entries for it are kept.
    pub fn delist_product(&self, product_id: ProductId) {
        lock(&self.state).products.remove(&product_id);
    }

    /// Register another account.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is malformed.
    pub fn add_user(&self, email: &str, password: &str) -> Result<UserId, basket_core::EmailError> {
        let email = Email::parse(email)?;
        Ok(lock(&self.state).add_user(email, password))
    }

    /// Reject every cart or favorites add of this product with a 422.
    pub fn reject_product(&self, product_id: ProductId) {
        lock(&self.state).rejected.insert(product_id);
    }

    /// Answer every collection endpoint with a 503.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    /// Invalidate every issued token.
    pub fn revoke_sessions(&self) {
        lock(&self.state).tokens.clear();
    }

    /// Put an entry straight into an account's cart.
    pub fn seed_cart(&self, email: &str, product_id: ProductId, quantity: u32) {
        let mut state = lock(&self.state);
        let (Some(user), Some(product)) =
            (state.user_id(email), state.products.get(&product_id).cloned())
        else {
            return;
        };
        let item = state.item(&product, quantity);
        state.carts.entry(user).or_default().push(item);
    }

    /// `(product_id, quantity)` pairs of an account's cart, in server order.
    #[must_use]
    pub fn cart(&self, email: &str) -> Vec<(i32, u32)> {
        let state = lock(&self.state);
        state
            .user_id(email)
            .and_then(|user| state.carts.get(&user))
            .map(|items| {
                items
                    .iter()
                    .map(|i| (i.product_id.as_i32(), i.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Product IDs of an account's favorites, in server order.
    #[must_use]
    pub fn favorites(&self, email: &str) -> Vec<i32> {
        let state = lock(&self.state);
        state
            .user_id(email)
            .and_then(|user| state.favorites.get(&user))
            .map(|items| items.iter().map(|i| i.product_id.as_i32()).collect())
            .unwrap_or_default()
    }

    /// Number of successful logins.
    #[must_use]
    pub fn login_count(&self) -> usize {
        lock(&self.state).logins
    }
}
