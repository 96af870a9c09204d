//! Cart domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use ecommerce_core::{CartId, EntryId, UserId};

use super::catalog::Product;

/// A line item in a cart.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub id: EntryId,
    pub product: Product,
    pub quantity: u32,
}

impl Entry {
    /// Price of the product times the quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price.times(self.quantity)
    }
}

/// A user's cart with its entries.
#[derive(Debug, Clone)]
pub struct Cart {
    pub id: CartId,
    pub user: UserId,
    pub entries: Vec<Entry>,
}

impl Cart {
    /// Sum of all line totals.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.entries.iter().map(Entry::line_total).sum()
    }

    /// Total number of units across entries.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.quantity)).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use ecommerce_core::{CategoryId, Price, ProductId};

    use super::*;

    fn product(id: i32, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            category: CategoryId::new(1),
            name: format!("Product {id}"),
            description: String::new(),
            price: Price::from_cents(cents).unwrap(),
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart {
            id: CartId::new(1),
            user: UserId::new(1),
            entries: vec![
                Entry {
                    id: EntryId::new(1),
                    product: product(1, 1999),
                    quantity: 2,
                },
                Entry {
                    id: EntryId::new(2),
                    product: product(2, 500),
                    quantity: 1,
                },
            ],
        };

        assert_eq!(cart.total(), Decimal::from_str("44.98").unwrap());
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_empty_cart_totals() {
        let cart = Cart {
            id: CartId::new(1),
            user: UserId::new(1),
            entries: Vec::new(),
        };
        assert_eq!(cart.total(), Decimal::ZERO);
        assert_eq!(cart.item_count(), 0);
    }
}
