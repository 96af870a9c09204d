//! Cart repository: carts and their entries.

use sqlx::PgPool;

use ecommerce_core::{CartId, EntryId, ProductId, UserId};

use super::RepositoryError;
use super::catalog::ProductRow;
use crate::models::{Cart, Entry, Product};

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    entry_id: i32,
    quantity: i32,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<EntryRow> for Entry {
    type Error = RepositoryError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity {} for entry {}",
                row.quantity, row.entry_id
            ))
        })?;

        Ok(Self {
            id: EntryId::new(row.entry_id),
            product: Product::try_from(row.product)?,
            quantity,
        })
    }
}

/// Result of adding a product to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedEntry {
    pub cart: CartId,
    pub entry: EntryId,
    /// Quantity after the increment.
    pub quantity: u32,
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a cart with its entries, only if it belongs to `user`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        id: CartId,
        user: UserId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let owned: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM shop.cart WHERE id = $1 AND user_id = $2")
                .bind(id.as_i32())
                .bind(user.as_i32())
                .fetch_optional(self.pool)
                .await?;

        if owned.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, EntryRow>(
            r"
            SELECT e.id AS entry_id, e.quantity,
                   p.id, p.category_id, p.name, p.description, p.price, p.image,
                   p.created_at, p.updated_at
            FROM shop.cart_entry e
            JOIN shop.product p ON p.id = e.product_id
            WHERE e.cart_id = $1
            ORDER BY e.id
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(Entry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Cart { id, user, entries }))
    }

    /// Add one unit of a product to the user's cart.
    ///
    /// Creates the cart and the entry when missing. The increment happens in
    /// SQL, so concurrent adds never lose an update or duplicate the entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn add_product(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<AddedEntry, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM shop.product WHERE id = $1)")
                .bind(product.as_i32())
                .fetch_one(&mut *tx)
                .await?;
        if !exists.0 {
            return Err(RepositoryError::NotFound);
        }

        let (cart_id,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO shop.cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user.as_i32())
        .fetch_one(&mut *tx)
        .await?;

        let (entry_id, quantity): (i32, i32) = sqlx::query_as(
            r"
            INSERT INTO shop.cart_entry (cart_id, product_id, quantity)
            VALUES ($1, $2, 1)
            ON CONFLICT ON CONSTRAINT cart_entry_cart_product_key
            DO UPDATE SET quantity = cart_entry.quantity + 1
            RETURNING id, quantity
            ",
        )
        .bind(cart_id)
        .bind(product.as_i32())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let quantity = u32::try_from(quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative quantity for entry {entry_id}"))
        })?;

        Ok(AddedEntry {
            cart: CartId::new(cart_id),
            entry: EntryId::new(entry_id),
            quantity,
        })
    }
}
