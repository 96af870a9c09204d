//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ecommerce_core::{Email, PhoneNumber, UserId, Username};

/// An API user (domain type).
///
/// Users registered by email have an email and a password; users created by
/// phone OTP login have a phone number and no password.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Unique alphanumeric username.
    pub username: Username,
    /// Email address, if registered by email.
    pub email: Option<Email>,
    /// Phone number, if created by phone login.
    pub phone_number: Option<PhoneNumber>,
    /// Whether the account has been verified (email link or OTP).
    pub is_verified: bool,
    /// Disabled accounts cannot log in.
    pub is_active: bool,
    /// Staff users may manage the catalog.
    pub is_staff: bool,
    /// Last successful login.
    #[serde(skip)]
    pub last_login: Option<DateTime<Utc>>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Address used for outgoing mail, if any.
    #[must_use]
    pub const fn mail_address(&self) -> Option<&Email> {
        self.email.as_ref()
    }
}
