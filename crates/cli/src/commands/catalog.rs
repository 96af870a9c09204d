//! Catalog seeding command.
//!
//! Reads categories and their products from YAML and upserts them, so the
//! same file can be applied repeatedly.
//!
//! ```yaml
//! categories:
//!   - name: Tea
//!     products:
//!       - name: Sencha
//!         description: Green tea from Shizuoka
//!         price: "12.50"
//!         image: /media/sencha.jpg
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use ecommerce_api::db::CatalogRepository;
use ecommerce_api::models::NewProduct;
use ecommerce_core::Price;

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub image: Option<String>,
}

/// Totals reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub created: usize,
    pub updated: usize,
}

/// Parse a seed file, rejecting blank names before touching the database.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or a name is blank.
pub fn parse(content: &str) -> Result<CatalogSeed, Box<dyn std::error::Error>> {
    let seed: CatalogSeed = serde_yaml::from_str(content)?;

    for category in &seed.categories {
        if category.name.trim().is_empty() {
            return Err("category name may not be blank".into());
        }
        if let Some(product) = category.products.iter().find(|p| p.name.trim().is_empty()) {
            return Err(format!(
                "product name may not be blank (category {}, price {})",
                category.name, product.price
            )
            .into());
        }
    }

    Ok(seed)
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a database
/// operation fails.
pub async fn seed(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = parse(&content)?;
    info!(categories = seed.categories.len(), "Parsed catalog");

    let pool = super::connect().await?;
    let catalog = CatalogRepository::new(&pool);
    let mut summary = SeedSummary::default();

    for category_seed in seed.categories {
        let category = catalog.upsert_category(category_seed.name.trim()).await?;
        summary.categories += 1;

        for product in category_seed.products {
            let (product, created) = catalog
                .upsert_product(&NewProduct {
                    category: category.id,
                    name: product.name,
                    description: product.description,
                    price: product.price,
                    image: product.image,
                })
                .await?;
            if created {
                summary.created += 1;
            } else {
                summary.updated += 1;
            }
            tracing::debug!(product_id = %product.id, created, "Product seeded");
        }
    }

    info!("Seeding complete!");
    info!("  Categories: {}", summary.categories);
    info!("  Products created: {}", summary.created);
    info!("  Products updated: {}", summary.updated);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_file() {
        let seed = parse(
            r#"
categories:
  - name: Tea
    products:
      - name: Sencha
        price: "12.50"
      - name: Matcha
        description: Ceremonial grade
        price: "30.00"
        image: /media/matcha.jpg
  - name: Empty
"#,
        )
        .unwrap();

        assert_eq!(seed.categories.len(), 2);
        let tea = seed.categories.first().unwrap();
        assert_eq!(tea.products.len(), 2);
        assert_eq!(tea.products.first().unwrap().description, "");
        assert_eq!(tea.products.first().unwrap().price, Price::from_cents(1250).unwrap());
        assert!(seed.categories.last().unwrap().products.is_empty());
    }

    #[test]
    fn test_parse_rejects_blank_names() {
        assert!(parse("categories:\n  - name: ' '\n").is_err());
        assert!(
            parse("categories:\n  - name: Tea\n    products:\n      - name: ''\n        price: '1.00'\n")
                .is_err()
        );
    }

    #[test]
    fn test_parse_rejects_negative_price() {
        assert!(
            parse("categories:\n  - name: Tea\n    products:\n      - name: X\n        price: '-1.00'\n")
                .is_err()
        );
    }
}
