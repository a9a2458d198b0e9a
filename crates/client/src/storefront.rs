//! Application context shared by front ends.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use basket_core::{Email, ProductId};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::facade::SyncedCollection;
use crate::kind::{Cart, Favorites};
use crate::local::LocalStore;
use crate::notify::Notifier;
use crate::reconcile::ReconcileReport;
use crate::remote::{ApiClient, Catalog, RemoteError, RestCart, RestFavorites};
use crate::session::{self, AuthSession, SessionHandle, SessionState};
use crate::storage::Storage;

/// Cart backed by the REST API.
pub type CartContext<S> = SyncedCollection<Cart, S, RestCart>;

/// Favorites backed by the REST API.
pub type FavoritesContext<S> = SyncedCollection<Favorites, S, RestFavorites>;

/// Migration outcome per collection after signing in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInSummary {
    pub cart: Option<ReconcileReport>,
    pub favorites: Option<ReconcileReport>,
}

/// Everything a front end needs, built once at startup.
///
/// This struct is cheaply cloneable via `Arc`.
pub struct Storefront<S> {
    inner: Arc<StorefrontInner<S>>,
}

impl<S> Clone for Storefront<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct StorefrontInner<S> {
    config: ClientConfig,
    storage: Arc<S>,
    session: SessionHandle,
    notifier: Notifier,
    api: ApiClient,
    catalog: Catalog,
    cart: Arc<CartContext<S>>,
    favorites: Arc<FavoritesContext<S>>,
}

impl<S: Storage + 'static> Storefront<S> {
    /// Build the context in guest mode, hydrating guest collections from
    /// `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, storage: Arc<S>) -> Result<Self> {
        let session = SessionHandle::new();
        let notifier = Notifier::new();
        let api = ApiClient::new(&config, session.subscribe())?;
        let catalog = Catalog::new(api.clone(), config.product_cache_ttl);

        let cart = Arc::new(SyncedCollection::new(
            LocalStore::load(Arc::clone(&storage)),
            RestCart::new(api.clone()),
            notifier.clone(),
        ));
        let favorites = Arc::new(SyncedCollection::new(
            LocalStore::load(Arc::clone(&storage)),
            RestFavorites::new(api.clone()),
            notifier.clone(),
        ));

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                storage,
                session,
                notifier,
                api,
                catalog,
                cart,
                favorites,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &Arc<CartContext<S>> {
        &self.inner.cart
    }

    #[must_use]
    pub fn favorites(&self) -> &Arc<FavoritesContext<S>> {
        &self.inner.favorites
    }

    /// Resume a persisted session, if any.
    ///
    /// Returns whether a session was restored.
    ///
    /// # Errors
    ///
    /// Returns the server error if the collections cannot be loaded.
    pub async fn resume(&self) -> Result<bool> {
        let Some(restored) = session::restore(self.inner.storage.as_ref()) else {
            return Ok(false);
        };
        info!(account = %restored.account.email, "Resuming persisted session");
        match self.enter(restored).await {
            Err(Error::Remote(RemoteError::Unauthorized)) => {
                warn!("Persisted session was rejected, continuing as guest");
                self.sign_out().await;
                Ok(false)
            }
            result => result.map(|_| true),
        }
    }

    /// Sign in with email and password.
    ///
    /// Guest entries of both collections are migrated to the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected, or if loading the
    /// account's collections fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(&self, email: &Email, password: &SecretString) -> Result<SignInSummary> {
        let response = self
            .inner
            .api
            .login(email, password)
            .await
            .inspect_err(|e| {
                error!(error = %e, "Sign-in failed");
                self.inner.notifier.error(format!("Sign-in failed: {e}"));
            })?;

        let auth = AuthSession::from(response);
        if let Err(e) = session::persist(self.inner.storage.as_ref(), &auth) {
            warn!(error = %e, "Failed to persist session, it will end with this process");
        }
        self.enter(auth).await
    }

    /// Sign out. Guest collections become visible again, untouched.
    pub async fn sign_out(&self) {
        if let Err(e) = session::forget(self.inner.storage.as_ref()) {
            warn!(error = %e, "Failed to delete persisted session");
        }
        self.inner.session.sign_out();

        let state = SessionState::Guest;
        // Switching to guest makes no server calls and cannot fail
        let _ = self.inner.cart.handle_session_change(&state).await;
        let _ = self.inner.favorites.handle_session_change(&state).await;
    }

    /// Add a product to the cart.
    ///
    /// Signed in, only the ID is sent. As a guest, a product not yet in the
    /// cart is looked up in the catalog for its display data.
    ///
    /// # Errors
    ///
    /// Returns an error if the authenticated add or the guest lookup fails.
    pub async fn add_to_cart(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let catalog = &self.inner.catalog;
        self.inner.cart.add_by_id(product_id, quantity, move |id| catalog.product(id)).await
    }

    /// Add a product to favorites, looked up as in [`Self::add_to_cart`].
    ///
    /// # Errors
    ///
    /// Returns an error if the authenticated add or the guest lookup fails.
    pub async fn add_favorite(&self, product_id: ProductId) -> Result<()> {
        let catalog = &self.inner.catalog;
        self.inner.favorites.add_by_id(product_id, 1, move |id| catalog.product(id)).await
    }

    /// Flip a product's favorite status. Returns the new status.
    ///
    /// Only adding consults the catalog, so a product that has since been
    /// delisted can still be removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the authenticated operation or the guest lookup
    /// fails.
    pub async fn toggle_favorite(&self, product_id: ProductId) -> Result<bool> {
        let catalog = &self.inner.catalog;
        self.inner.favorites.toggle(product_id, move |id| catalog.product(id)).await
    }

    /// Have both collections follow session changes on background tasks.
    ///
    /// For long-running hosts. [`Self::sign_in`] and [`Self::sign_out`]
    /// already drive the collections directly; a listener running alongside
    /// sees the transition as already applied.
    #[must_use]
    pub fn spawn_session_listeners(&self) -> [JoinHandle<()>; 2] {
        [
            Arc::clone(&self.inner.cart).spawn_session_listener(self.inner.session.subscribe()),
            Arc::clone(&self.inner.favorites)
                .spawn_session_listener(self.inner.session.subscribe()),
        ]
    }

    async fn enter(&self, auth: AuthSession) -> Result<SignInSummary> {
        self.inner.session.sign_in(auth);
        let state = self.inner.session.current();

        // Both collections switch even if the first one fails to load
        let cart = self.inner.cart.handle_session_change(&state).await;
        let favorites = self.inner.favorites.handle_session_change(&state).await;
        Ok(SignInSummary {
            cart: cart?,
            favorites: favorites?,
        })
    }
}
