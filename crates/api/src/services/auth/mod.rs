//! Authentication service.
//!
//! Password registration and login, email verification, password reset and
//! account lookup for phone login.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use ecommerce_core::{Email, PhoneNumber, UserId, Username};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::error::FieldErrors;
use crate::models::User;
use crate::services::password_reset::{PasswordResetTokens, decode_uid, encode_uid};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;
/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 68;

/// A validated registration request.
#[derive(Debug)]
pub struct Registration {
    pub email: Email,
    pub username: Username,
    pub password: String,
}

impl Registration {
    /// Validate raw registration input, collecting every field error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` with one entry per invalid field.
    pub fn parse(email: &str, username: &str, password: &str) -> Result<Self, AuthError> {
        let mut errors = FieldErrors::new();

        let email = Email::parse(email)
            .map_err(|_| errors.add("email", "Enter a valid email address."))
            .ok();
        let username = Username::parse(username)
            .map_err(|e| errors.add("username", e.to_string()))
            .ok();
        if let Err(message) = validate_password(password) {
            errors.add("password", message);
        }

        match (email, username) {
            (Some(email), Some(username)) if errors.is_empty() => Ok(Self {
                email,
                username,
                password: password.to_owned(),
            }),
            _ => Err(AuthError::Validation(errors)),
        }
    }
}

/// Link parts for a password reset email.
#[derive(Debug, Clone)]
pub struct ResetLink {
    pub user: User,
    pub uidb64: String,
    pub token: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Registration & Login
    // =========================================================================

    /// Register a new, unverified user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the email or username is taken.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let password_hash = hash_password(&registration.password)?;
        self.create_user(registration, &password_hash, false, false)
            .await
    }

    /// Create a user directly, optionally verified and staff.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the email or username is taken.
    pub async fn create_verified_user(
        &self,
        registration: &Registration,
        is_staff: bool,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(&registration.password)?;
        self.create_user(registration, &password_hash, true, is_staff)
            .await
    }

    async fn create_user(
        &self,
        registration: &Registration,
        password_hash: &str,
        is_verified: bool,
        is_staff: bool,
    ) -> Result<User, AuthError> {
        self.users
            .create_with_password(NewUser {
                username: &registration.username,
                email: &registration.email,
                password_hash,
                is_verified,
                is_staff,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(constraint) => {
                    let mut errors = FieldErrors::new();
                    if constraint.contains("email") {
                        errors.add("email", "user with this email already exists.");
                    } else {
                        errors.add("username", "user with this username already exists.");
                    }
                    AuthError::Validation(errors)
                }
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// Records the login time on success.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountDisabled` if the account is inactive.
    /// Returns `AuthError::EmailNotVerified` if the email is not yet verified.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_hash = password_hash.ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &password_hash)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        if !user.is_verified {
            return Err(AuthError::EmailNotVerified);
        }

        self.users.touch_last_login(user.id).await?;
        Ok(user)
    }

    /// Get or create the account for a verified phone number.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccountDisabled` if the account is inactive.
    pub async fn login_with_phone(&self, phone: &PhoneNumber) -> Result<User, AuthError> {
        let user = self.users.get_or_create_by_phone(phone).await?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        self.users.touch_last_login(user.id).await?;
        Ok(user)
    }

    /// Mark a user's email as verified.
    ///
    /// Returns `true` if the account was newly verified.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn verify_email(&self, user_id: UserId) -> Result<bool, AuthError> {
        let user = self.get_user(user_id).await?;
        if user.is_verified {
            return Ok(false);
        }
        Ok(self.users.mark_verified(user.id).await?)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Build a reset link for the user with this email, if there is one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn reset_link(
        &self,
        tokens: &PasswordResetTokens,
        email: &str,
    ) -> Result<Option<ResetLink>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some((user, password_hash)) = self.users.get_password_hash(&email).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let token = tokens
            .make_token(&user, password_hash.as_deref())
            .map_err(|_| AuthError::PasswordHash)?;

        Ok(Some(ResetLink {
            uidb64: encode_uid(user.id),
            token,
            user,
        }))
    }

    /// Resolve and check a reset link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidResetLink` if the uid or token is bad.
    pub async fn check_reset_link(
        &self,
        tokens: &PasswordResetTokens,
        uidb64: &str,
        token: &str,
    ) -> Result<User, AuthError> {
        let user_id = decode_uid(uidb64).ok_or(AuthError::InvalidResetLink)?;
        let user = match self.users.get_by_id(user_id).await? {
            Some(user) => user,
            None => return Err(AuthError::InvalidResetLink),
        };
        let password_hash = self.users.password_hash_for(user.id).await?;

        if !tokens.check_token(&user, password_hash.as_deref(), token) {
            return Err(AuthError::InvalidResetLink);
        }
        Ok(user)
    }

    /// Set a new password through a reset link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the password is out of bounds.
    /// Returns `AuthError::InvalidResetLink` if the uid or token is bad.
    pub async fn complete_reset(
        &self,
        tokens: &PasswordResetTokens,
        uidb64: &str,
        token: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if let Err(message) = validate_password(password) {
            let mut errors = FieldErrors::new();
            errors.add("password", message);
            return Err(AuthError::Validation(errors));
        }

        let user = self.check_reset_link(tokens, uidb64, token).await?;
        let password_hash = hash_password(password)?;
        self.users.set_password_hash(user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(user)
    }
}

/// Validate password length bounds.
fn validate_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Ensure this field has at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {MAX_PASSWORD_LENGTH} characters."
        ));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_valid() {
        let registration = Registration::parse("Alice@Example.com", "alice1", "hunter22").unwrap();
        assert_eq!(registration.email.as_str(), "Alice@example.com");
        assert_eq!(registration.username.as_str(), "alice1");
    }

    #[test]
    fn test_registration_collects_all_errors() {
        let Err(AuthError::Validation(errors)) = Registration::parse("nope", "not valid!", "123")
        else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["email"][0], "Enter a valid email address.");
        assert_eq!(
            json["username"][0],
            "The username should only contain alphanumeric characters"
        );
        assert_eq!(
            json["password"][0],
            "Ensure this field has at least 6 characters."
        );
    }

    #[test]
    fn test_password_bounds() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password(&"x".repeat(68)).is_ok());
        assert!(validate_password(&"x".repeat(69)).is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_password_bad_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
