//! Catalog domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ecommerce_core::{CategoryId, Price, ProductId};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    /// Owning category.
    pub category: CategoryId,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Image URL or media path.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub category: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewProduct {
    /// Maximum length of a product name.
    pub const MAX_NAME_LENGTH: usize = 255;

    /// Validate fields not covered by their types.
    ///
    /// Returns `(field, message)` pairs for each problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<(&'static str, String)> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push(("name", "This field may not be blank.".to_owned()));
        } else if name.chars().count() > Self::MAX_NAME_LENGTH {
            errors.push((
                "name",
                format!(
                    "Ensure this field has no more than {} characters.",
                    Self::MAX_NAME_LENGTH
                ),
            ));
        }

        if self.image.as_deref().is_some_and(|i| i.trim().is_empty()) {
            errors.push(("image", "This field may not be blank.".to_owned()));
        }

        errors
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_product(name: &str) -> NewProduct {
        serde_json::from_value(serde_json::json!({
            "category": 1,
            "name": name,
            "price": "12.50",
        }))
        .unwrap()
    }

    #[test]
    fn test_new_product_defaults() {
        let product = new_product("Mug");
        assert_eq!(product.description, "");
        assert!(product.image.is_none());
        assert!(product.validate().is_empty());
    }

    #[test]
    fn test_new_product_blank_name() {
        let errors = new_product("   ").validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().map(|e| e.0), Some("name"));
    }

    #[test]
    fn test_new_product_long_name() {
        let errors = new_product(&"x".repeat(256)).validate();
        assert_eq!(errors.first().map(|e| e.0), Some("name"));
    }

    #[test]
    fn test_new_product_rejects_negative_price() {
        let result = serde_json::from_value::<NewProduct>(serde_json::json!({
            "category": 1,
            "name": "Mug",
            "price": "-1.00",
        }));
        assert!(result.is_err());
    }
}
