//! Phone one-time password records.

use chrono::{DateTime, Utc};

use ecommerce_core::{PhoneNumber, PhoneTokenId};

/// A one-time password issued to a phone number.
#[derive(Debug, Clone)]
pub struct PhoneToken {
    pub id: PhoneTokenId,
    pub phone_number: PhoneNumber,
    pub otp: String,
    /// Validation attempts made against this token.
    pub attempts: i32,
    /// Set once the token has been exchanged for a login.
    pub used: bool,
    pub created_at: DateTime<Utc>,
}
