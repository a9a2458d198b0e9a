//! Basket Client - Cart and favorites that survive signing in.
//!
//! A shopper can fill a cart and mark favorites before having an account.
//! Those guest collections live in local [`storage`]; once the shopper signs
//! in, the server becomes the source of truth and the guest entries are
//! pushed to it exactly once.
//!
//! # Architecture
//!
//! - [`local`] - Guest collections, persisted as one record per collection
//! - [`remote`] - REST clients for the account's collections and the catalog
//! - [`reconcile`] - One-shot guest-to-account migration
//! - [`facade`] - [`SyncedCollection`], the single surface callers use,
//!   routing every operation by session state
//! - [`session`] - Current session, broadcast over a `tokio::sync::watch`
//! - [`notify`] - Success and error notices for the user
//! - [`storefront`] - Wires all of the above from a [`ClientConfig`]
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env()?;
//! let storage = Arc::new(FileStorage::new(&config.state_dir));
//! let storefront = Storefront::new(config, storage)?;
//! storefront.resume().await?;
//! storefront.add_to_cart(ProductId::new(42), 2).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod facade;
pub mod kind;
pub mod local;
pub mod notify;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod storage;
pub mod storefront;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, ConfigError};
pub use error::{Error, Result};
pub use facade::{CollectionSnapshot, SyncedCollection};
pub use kind::{Cart, CollectionKind, Favorites};
pub use local::LocalStore;
pub use notify::{Notice, NoticeLevel, Notifier};
pub use reconcile::ReconcileReport;
pub use remote::{ApiClient, Catalog, RemoteError, RemoteStore, RestCart, RestFavorites};
pub use session::{AuthSession, SessionHandle, SessionState};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use storefront::{CartContext, FavoritesContext, SignInSummary, Storefront};
