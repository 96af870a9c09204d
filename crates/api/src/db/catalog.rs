//! Catalog repository: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use ecommerce_core::{CategoryId, Price, ProductId};

use super::RepositoryError;
use crate::models::{Category, NewProduct, Product};

const PRODUCT_COLUMNS: &str =
    "p.id, p.category_id, p.name, p.description, p.price, p.image, p.created_at, p.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    pub(super) id: i32,
    pub(super) category_id: i32,
    pub(super) name: String,
    pub(super) description: String,
    pub(super) price: Decimal,
    pub(super) image: Option<String>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Price::new(row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            category: CategoryId::new(row.category_id),
            name: row.name,
            description: row.description,
            price,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn collect_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Repository for catalog database operations.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every category, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, created_at FROM shop.category ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// List every product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p ORDER BY p.created_at DESC, p.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        collect_products(rows)
    }

    /// List the products of the category with the given name.
    ///
    /// An unknown category yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products_in_category(
        &self,
        category_name: &str,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM shop.product p
            JOIN shop.category c ON c.id = p.category_id
            WHERE c.name = $1
            ORDER BY p.created_at DESC, p.id DESC
            "
        ))
        .bind(category_name)
        .fetch_all(self.pool)
        .await?;

        collect_products(rows)
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product p WHERE p.id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Database` if the insert fails otherwise.
    pub async fn create_product(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO shop.product AS p (category_id, name, description, price, image)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(new.category.as_i32())
        .bind(new.name.trim())
        .bind(&new.description)
        .bind(new.price.amount())
        .bind(new.image.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        Product::try_from(row)
    }

    /// Get a category by name, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_category(&self, name: &str) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO shop.category (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, created_at
            ",
        )
        .bind(name)
        .fetch_one(self.pool)
        .await?;

        Ok(Category::from(row))
    }

    /// Create or update a product identified by its category and name.
    ///
    /// Returns the product and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn upsert_product(&self, new: &NewProduct) -> Result<(Product, bool), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE shop.product AS p
            SET description = $3, price = $4, image = $5, updated_at = NOW()
            WHERE p.category_id = $1 AND p.name = $2
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(new.category.as_i32())
        .bind(new.name.trim())
        .bind(&new.description)
        .bind(new.price.amount())
        .bind(new.image.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let (row, created) = match updated {
            Some(row) => (row, false),
            None => {
                let row = sqlx::query_as::<_, ProductRow>(&format!(
                    r"
                    INSERT INTO shop.product AS p (category_id, name, description, price, image)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {PRODUCT_COLUMNS}
                    "
                ))
                .bind(new.category.as_i32())
                .bind(new.name.trim())
                .bind(&new.description)
                .bind(new.price.amount())
                .bind(new.image.as_deref())
                .fetch_one(&mut *tx)
                .await?;
                (row, true)
            }
        };

        tx.commit().await?;
        Ok((Product::try_from(row)?, created))
    }
}
