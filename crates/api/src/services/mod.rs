//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, email verification and password reset
//! - `tokens` - JWT access/refresh tokens
//! - `password_reset` - Stateless reset-link tokens
//! - `otp` - Phone one-time password policy
//! - `email` - Verification and reset emails (SMTP or log)
//! - `sms` - OTP delivery (webhook or log)

pub mod auth;
pub mod email;
pub mod otp;
pub mod password_reset;
pub mod sms;
pub mod tokens;
