//! Core types for Basket.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod item;
pub mod money;
pub mod wire;

pub use email::{Email, EmailError};
pub use id::*;
pub use item::{DisplaySnapshot, ItemView, LocalItem, Product, RemoteItem};
pub use money::{Discount, DiscountError, format_price};
