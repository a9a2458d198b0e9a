//! Basket Core - Shared types library.
//!
//! This crate provides the types shared by all Basket components:
//! - `client` - Local/remote cart and favorites synchronization
//! - `cli` - Command-line front end driving the client
//! - `integration-tests` - Mock REST backend and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. Both the client and the mock backend speak the wire
//! types defined here, so they cannot drift apart.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails, cart/favorites items and wire bodies

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
