//! Unified error handling for the client library.
//!
//! Guest-mode operations never fail, so in practice every `Error` a caller
//! sees comes from an authenticated operation, a catalog lookup, or setup.

use thiserror::Error;

use basket_core::ProductId;

use crate::config::ConfigError;
use crate::remote::RemoteError;

/// Client-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// REST API call failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The product has no entry in the authenticated collection.
    #[error("product {product_id} is not in the {collection}")]
    NotInCollection {
        collection: &'static str,
        product_id: ProductId,
    },
}

/// Result type alias for `Error`.
pub type Result<T> = std::result::Result<T, Error>;
