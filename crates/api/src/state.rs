//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::email::{EmailError, EmailService};
use crate::services::otp::OtpPolicy;
use crate::services::password_reset::PasswordResetTokens;
use crate::services::sms::{SmsError, SmsService};
use crate::services::tokens::TokenService;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("email service: {0}")]
    Email(#[from] EmailError),
    #[error("sms service: {0}")]
    Sms(#[from] SmsError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenService,
    reset_tokens: PasswordResetTokens,
    otp: OtpPolicy,
    email: EmailService,
    sms: SmsService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the email or SMS service cannot be configured.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let tokens = TokenService::new(&config.secret_key, &config.tokens);
        let reset_tokens = PasswordResetTokens::new(
            config.secret_key.clone(),
            config.tokens.password_reset_timeout,
        );
        let otp = OtpPolicy::new(config.phone_login);
        let email = EmailService::new(&config.email)?;
        let sms = SmsService::new(config.sms.clone())?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                reset_tokens,
                otp,
                email,
                sms,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// JWT issuing and validation.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Password reset link tokens.
    #[must_use]
    pub fn reset_tokens(&self) -> &PasswordResetTokens {
        &self.inner.reset_tokens
    }

    /// Phone OTP rules.
    #[must_use]
    pub fn otp(&self) -> &OtpPolicy {
        &self.inner.otp
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    #[must_use]
    pub fn sms(&self) -> &SmsService {
        &self.inner.sms
    }
}
