//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("price must have at most {max} decimal places")]
    TooPrecise {
        /// Maximum decimal places.
        max: u32,
    },
    /// The amount does not fit the `NUMERIC(10,2)` column.
    #[error("price must be less than {max}")]
    TooLarge {
        /// Exclusive upper bound.
        max: u64,
    },
}

/// A non-negative price with at most two decimal places.
///
/// Serialized as a string (`"19.99"`) to avoid float rounding on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Maximum number of decimal places.
    pub const SCALE: u32 = 2;
    /// Exclusive upper bound for a price (`NUMERIC(10,2)`).
    pub const MAX: u64 = 100_000_000;

    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative, has more than two decimal
    /// places, or exceeds the storable range.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if amount.normalize().scale() > Self::SCALE {
            return Err(PriceError::TooPrecise { max: Self::SCALE });
        }
        if amount >= Decimal::from(Self::MAX) {
            return Err(PriceError::TooLarge { max: Self::MAX });
        }
        Ok(Self(amount))
    }

    /// Create a price from a number of cents.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative or too large.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, Self::SCALE))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Total for `quantity` units of this price.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Decimal {
        (self.0 * Decimal::from(quantity)).round_dp(Self::SCALE)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_new_valid() {
        let price = Price::new(Decimal::from_str("19.99").unwrap()).unwrap();
        assert_eq!(price.to_string(), "19.99");
        assert_eq!(Price::from_cents(500).unwrap().to_string(), "5.00");
    }

    #[test]
    fn test_new_rejects_negative() {
        assert_eq!(Price::from_cents(-1), Err(PriceError::Negative));
    }

    #[test]
    fn test_new_rejects_extra_precision() {
        let amount = Decimal::from_str("1.005").unwrap();
        assert_eq!(Price::new(amount), Err(PriceError::TooPrecise { max: 2 }));

        // Trailing zeros are not extra precision
        assert!(Price::new(Decimal::from_str("1.500").unwrap()).is_ok());
    }

    #[test]
    fn test_new_rejects_too_large() {
        assert!(Price::new(Decimal::from(100_000_000u64)).is_err());
        assert!(Price::new(Decimal::from_str("99999999.99").unwrap()).is_ok());
    }

    #[test]
    fn test_times() {
        let price = Price::from_cents(1250).unwrap();
        assert_eq!(price.times(3), Decimal::from_str("37.50").unwrap());
        assert_eq!(price.times(0), Decimal::ZERO);
    }

    #[test]
    fn test_serde_as_string() {
        let price = Price::from_cents(1999).unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"19.99\"");

        let parsed: Price = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(parsed, price);
        assert!(serde_json::from_str::<Price>("\"-3.00\"").is_err());
    }
}
