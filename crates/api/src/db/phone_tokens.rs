//! Phone OTP token repository.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use ecommerce_core::{PhoneNumber, PhoneTokenId};

use super::RepositoryError;
use crate::models::PhoneToken;

#[derive(Debug, sqlx::FromRow)]
struct PhoneTokenRow {
    id: i32,
    phone_number: String,
    otp: String,
    attempts: i32,
    used: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PhoneTokenRow> for PhoneToken {
    type Error = RepositoryError;

    fn try_from(row: PhoneTokenRow) -> Result<Self, Self::Error> {
        let phone_number = PhoneNumber::parse(&row.phone_number).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone number in phone_token: {e}"))
        })?;

        Ok(Self {
            id: PhoneTokenId::new(row.id),
            phone_number,
            otp: row.otp,
            attempts: row.attempts,
            used: row.used,
            created_at: row.created_at,
        })
    }
}

/// Repository for phone token database operations.
pub struct PhoneTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PhoneTokenRepository<'a> {
    /// Create a new phone token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a transaction that serializes token issuing for one number.
    ///
    /// Concurrent callers for the same number wait on a transaction-scoped
    /// advisory lock, so a count taken through the returned handle stays
    /// accurate until it commits or is dropped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction or lock fails.
    pub async fn begin_issue<'p>(
        &self,
        phone: &'p PhoneNumber,
    ) -> Result<PhoneTokenIssue<'p>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('shop.phone_token'), hashtext($1))")
            .bind(phone.as_str())
            .execute(&mut *tx)
            .await?;

        Ok(PhoneTokenIssue { tx, phone })
    }

    /// Consume an unused token matching `id` and `otp` created at or after
    /// `issued_after`.
    ///
    /// On a match the token is marked used and its attempt counter bumped in
    /// one statement. On a miss the attempt counter of token `id` (if it
    /// exists) is still bumped and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn consume(
        &self,
        id: PhoneTokenId,
        otp: &str,
        issued_after: DateTime<Utc>,
    ) -> Result<Option<PhoneToken>, RepositoryError> {
        let row = sqlx::query_as::<_, PhoneTokenRow>(
            r"
            UPDATE shop.phone_token
            SET used = TRUE, attempts = attempts + 1
            WHERE id = $1 AND otp = $2 AND NOT used AND created_at >= $3
            RETURNING id, phone_number, otp, attempts, used, created_at
            ",
        )
        .bind(id.as_i32())
        .bind(otp)
        .bind(issued_after)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = row {
            return PhoneToken::try_from(row).map(Some);
        }

        sqlx::query("UPDATE shop.phone_token SET attempts = attempts + 1 WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(None)
    }
}

/// Token issuing for one phone number, holding its advisory lock.
///
/// Dropping without [`commit`](Self::commit) rolls back and releases the lock.
pub struct PhoneTokenIssue<'a> {
    tx: Transaction<'static, Postgres>,
    phone: &'a PhoneNumber,
}

impl PhoneTokenIssue<'_> {
    /// Count tokens issued to the number since `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_since(&mut self, since: DateTime<Utc>) -> Result<u32, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM shop.phone_token WHERE phone_number = $1 AND created_at >= $2",
        )
        .bind(self.phone.as_str())
        .bind(since)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Store a new token and commit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert or commit fails.
    pub async fn create(mut self, otp: &str) -> Result<PhoneToken, RepositoryError> {
        let row = sqlx::query_as::<_, PhoneTokenRow>(
            r"
            INSERT INTO shop.phone_token (phone_number, otp)
            VALUES ($1, $2)
            RETURNING id, phone_number, otp, attempts, used, created_at
            ",
        )
        .bind(self.phone.as_str())
        .bind(otp)
        .fetch_one(&mut *self.tx)
        .await?;

        self.tx.commit().await?;
        PhoneToken::try_from(row)
    }
}
