//! CLI error type.

use basket_client::ConfigError;
use basket_core::EmailError;
use thiserror::Error;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A client operation failed.
    #[error(transparent)]
    Client(#[from] basket_client::Error),

    /// The email argument is not a valid address.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}
