//! Phone one-time passwords.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use thiserror::Error;

use crate::config::PhoneLoginConfig;

/// Errors from the OTP policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    /// The phone number already received its daily quota of codes.
    #[error("you can not have more than {0} attempts per day, please try again tomorrow")]
    DailyLimit(u32),
}

/// Generate a random numeric code of `length` digits.
///
/// Leading zeros are allowed, so every code has exactly `length` characters.
#[must_use]
pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Midnight UTC of the day containing `now`.
#[must_use]
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}

/// Issue and expiry rules for phone OTPs.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    config: PhoneLoginConfig,
}

impl OtpPolicy {
    #[must_use]
    pub const fn new(config: PhoneLoginConfig) -> Self {
        Self { config }
    }

    /// Check whether another code may be issued given how many were issued
    /// to the number today.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::DailyLimit` once the quota is used up.
    pub const fn check_daily_limit(&self, issued_today: u32) -> Result<(), OtpError> {
        if issued_today >= self.config.attempts_per_day {
            return Err(OtpError::DailyLimit(self.config.attempts_per_day));
        }
        Ok(())
    }

    /// Oldest creation time a code may have and still be accepted at `now`.
    #[must_use]
    pub fn valid_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let validity = ChronoDuration::from_std(self.config.validity).unwrap_or(ChronoDuration::zero());
        now - validity
    }

    #[must_use]
    pub fn new_code(&self) -> String {
        generate_otp(self.config.otp_length)
    }

    /// Whether the code should be echoed back in the API response.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.config.debug
    }
}
