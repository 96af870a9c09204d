//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ecommerce_core::{Email, PhoneNumber, UserId, Username};

use super::RepositoryError;
use crate::models::User;

const USER_COLUMNS: &str = "id, username, email, phone_number, is_verified, is_active, \
                            is_staff, last_login, created_at, updated_at";

const PHONE_USERNAME_ATTEMPTS: usize = 5;

/// Username for an account created by phone login.
fn phone_username(phone: &PhoneNumber, suffix: Option<u32>) -> String {
    match suffix {
        Some(n) => format!("user{}{n}", phone.digits()),
        None => format!("user{}", phone.digits()),
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: Option<String>,
    phone_number: Option<String>,
    is_verified: bool,
    is_active: bool,
    is_staff: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;
        let phone_number = row
            .phone_number
            .as_deref()
            .map(PhoneNumber::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid phone number in database: {e}"))
            })?;

        Ok(Self {
            id: UserId::new(row.id),
            username,
            email,
            phone_number,
            is_verified: row.is_verified,
            is_active: row.is_active,
            is_staff: row.is_staff,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fields for a new email/password user.
pub struct NewUser<'a> {
    pub username: &'a Username,
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub is_verified: bool,
    pub is_staff: bool,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored field is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user together with their password hash.
    ///
    /// Returns `None` if the email is unknown. The hash is `None` for users
    /// created by phone login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, Option<String>)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            user: UserRow,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.user WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Get the stored password hash for a user ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn password_hash_for(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT password_hash FROM shop.user WHERE id = $1")
                .bind(id.as_i32())
                .fetch_optional(self.pool)
                .await?;

        row.map(|(hash,)| hash).ok_or(RepositoryError::NotFound)
    }

    /// Create a user with an email and password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` (with the constraint name) if the
    /// username or email already exists.
    pub async fn create_with_password(&self, new: NewUser<'_>) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO shop.user (username, email, password_hash, is_verified, is_staff)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new.username.as_str())
        .bind(new.email.as_str())
        .bind(new.password_hash)
        .bind(new.is_verified)
        .bind(new.is_staff)
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_unique_violation)?;

        User::try_from(row)
    }

    /// Get the user owning a phone number, creating a verified one if needed.
    ///
    /// The username is `user` followed by the phone digits. When another
    /// account already holds that name, a random numeric suffix is appended.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free username was found.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_by_phone(&self, phone: &PhoneNumber) -> Result<User, RepositoryError> {
        let mut username = phone_username(phone, None);

        for _ in 0..PHONE_USERNAME_ATTEMPTS {
            // The no-op update makes RETURNING yield the existing row on conflict
            let result = sqlx::query_as::<_, UserRow>(&format!(
                r"
                INSERT INTO shop.user (username, phone_number, is_verified)
                VALUES ($1, $2, TRUE)
                ON CONFLICT (phone_number) DO UPDATE SET phone_number = EXCLUDED.phone_number
                RETURNING {USER_COLUMNS}
                "
            ))
            .bind(&username)
            .bind(phone.as_str())
            .fetch_one(self.pool)
            .await
            .map_err(RepositoryError::from_unique_violation);

            match result {
                Ok(row) => return User::try_from(row),
                Err(RepositoryError::Conflict(constraint)) if constraint.contains("username") => {
                    tracing::debug!(%username, "Phone username taken, retrying with suffix");
                    username = phone_username(phone, Some(rand::random_range(1000..10_000)));
                }
                Err(e) => return Err(e),
            }
        }

        Err(RepositoryError::Conflict("user_username_key".to_owned()))
    }

    /// Mark a user's account as verified.
    ///
    /// Returns `true` if the flag changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_verified(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.user
            SET is_verified = TRUE, updated_at = NOW()
            WHERE id = $1 AND NOT is_verified
            ",
        )
        .bind(id.as_i32())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn touch_last_login(&self, id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.user SET last_login = NOW() WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.user
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_i32())
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
