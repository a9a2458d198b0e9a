//! Discount arithmetic on decimal prices.
//!
//! Prices are plain `rust_decimal::Decimal` amounts in the store currency;
//! the backend never mixes currencies inside one cart. A [`Discount`] is a
//! whole percentage applied per unit.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Error returned when a discount percentage is out of range.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("discount must be between 0 and 100 percent (got {0})")]
pub struct DiscountError(pub u8);

/// A whole-number discount percentage in `0..=100`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Discount(u8);

impl Discount {
    /// No discount.
    pub const NONE: Self = Self(0);

    /// Create a discount from a percentage.
    ///
    /// # Errors
    ///
    /// Returns `DiscountError` if `percent` is greater than 100.
    pub const fn new(percent: u8) -> Result<Self, DiscountError> {
        if percent > 100 {
            return Err(DiscountError(percent));
        }
        Ok(Self(percent))
    }

    /// The percentage value.
    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Apply the discount to a unit price, rounded to cents (half away from zero).
    #[must_use]
    pub fn apply(self, price: Decimal) -> Decimal {
        if self.0 == 0 {
            return price;
        }
        let factor = Decimal::ONE_HUNDRED - Decimal::from(self.0);
        (price * factor / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl TryFrom<u8> for Discount {
    type Error = DiscountError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Discount> for u8 {
    fn from(discount: Discount) -> Self {
        discount.0
    }
}

impl fmt::Display for Discount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Format an amount for display (e.g. `$19.90`).
#[must_use]
pub fn format_price(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}
