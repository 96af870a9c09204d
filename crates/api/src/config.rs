//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `API_BASE_URL` - Public URL used in email links (e.g., `https://shop.example.com`)
//! - `API_SECRET_KEY` - Signing secret for JWTs and password reset tokens (min 32 chars, high entropy)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 8000)
//! - `ACCESS_TOKEN_LIFETIME_SECS` - Access JWT lifetime (default: 300)
//! - `REFRESH_TOKEN_LIFETIME_SECS` - Refresh JWT lifetime (default: 86400)
//! - `PASSWORD_RESET_TIMEOUT_SECS` - Password reset link lifetime (default: 259200)
//! - `PHONE_LOGIN_ATTEMPTS` - OTPs allowed per phone number per day (default: 10)
//! - `PHONE_LOGIN_OTP_LENGTH` - Digits in a generated OTP (default: 6)
//! - `PHONE_LOGIN_MINUTES` - Minutes an OTP stays valid (default: 10)
//! - `PHONE_LOGIN_DEBUG` - Echo the OTP in the API response (default: false)
//! - `SMTP_HOST` - SMTP relay; emails are only logged when unset
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` / `SMTP_PASSWORD` - SMTP credentials
//! - `EMAIL_FROM` - Sender address (default: `noreply@localhost`)
//! - `SMS_WEBHOOK_URL` - HTTP endpoint that delivers SMS; messages are only logged when unset
//! - `SMS_FROM_NUMBER` - Sender number passed to the SMS webhook
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `LOG_FORMAT` - `json` for structured logs, text otherwise

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Secret used to sign JWTs and password reset tokens
    pub secret_key: SecretString,
    /// Token lifetimes
    pub tokens: TokenConfig,
    /// Phone OTP login settings
    pub phone_login: PhoneLoginConfig,
    /// Outgoing email settings
    pub email: EmailConfig,
    /// Outgoing SMS settings
    pub sms: SmsConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
}

/// JWT and reset-link lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct TokenConfig {
    pub access_lifetime: Duration,
    pub refresh_lifetime: Duration,
    pub password_reset_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_lifetime: Duration::from_secs(300),
            refresh_lifetime: Duration::from_secs(86_400),
            password_reset_timeout: Duration::from_secs(259_200),
        }
    }
}

/// Phone OTP login settings.
#[derive(Debug, Clone, Copy)]
pub struct PhoneLoginConfig {
    /// OTPs a phone number may request per day
    pub attempts_per_day: u32,
    /// Number of digits in a generated OTP
    pub otp_length: usize,
    /// How long an OTP stays valid
    pub validity: Duration,
    /// Include the OTP in the generate response (development only)
    pub debug: bool,
}

impl Default for PhoneLoginConfig {
    fn default() -> Self {
        Self {
            attempts_per_day: 10,
            otp_length: 6,
            validity: Duration::from_secs(10 * 60),
            debug: false,
        }
    }
}

/// Outgoing email settings.
///
/// Implements `Debug` manually to redact the SMTP password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP relay host; `None` logs emails instead of sending them
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "noreply@localhost".to_owned(),
        }
    }
}

/// Outgoing SMS settings.
#[derive(Debug, Clone, Default)]
pub struct SmsConfig {
    /// Webhook that delivers SMS; `None` logs messages instead
    pub webhook_url: Option<url::Url>,
    /// Sender number
    pub from_number: Option<String>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("API_DATABASE_URL")?;
        let host = get_parsed_or_default("API_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default("API_PORT", "8000")?;
        let base_url = get_required_env("API_BASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("API_BASE_URL".to_owned(), e.to_string()))?;

        let secret_key = get_validated_secret("API_SECRET_KEY")?;
        validate_secret_key(&secret_key, "API_SECRET_KEY")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            secret_key,
            tokens: TokenConfig::from_env()?,
            phone_login: PhoneLoginConfig::from_env()?,
            email: EmailConfig::from_env()?,
            sms: SmsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            json_logs: get_optional_env("LOG_FORMAT").is_some_and(|v| v == "json"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Build an absolute URL for a path on this server.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl TokenConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            access_lifetime: get_secs_or("ACCESS_TOKEN_LIFETIME_SECS", defaults.access_lifetime)?,
            refresh_lifetime: get_secs_or(
                "REFRESH_TOKEN_LIFETIME_SECS",
                defaults.refresh_lifetime,
            )?,
            password_reset_timeout: get_secs_or(
                "PASSWORD_RESET_TIMEOUT_SECS",
                defaults.password_reset_timeout,
            )?,
        })
    }
}

impl PhoneLoginConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let otp_length: usize = get_parsed_or_default("PHONE_LOGIN_OTP_LENGTH", "6")?;
        if !(4..=12).contains(&otp_length) {
            return Err(ConfigError::InvalidEnvVar(
                "PHONE_LOGIN_OTP_LENGTH".to_owned(),
                "must be between 4 and 12".to_owned(),
            ));
        }
        let minutes: u64 = get_parsed_or_default("PHONE_LOGIN_MINUTES", "10")?;

        Ok(Self {
            attempts_per_day: get_parsed_or_default("PHONE_LOGIN_ATTEMPTS", "10")?,
            otp_length,
            validity: minutes_to_duration("PHONE_LOGIN_MINUTES", minutes)?,
            debug: get_parsed_or_default("PHONE_LOGIN_DEBUG", "false")?,
        })
    }
}

fn minutes_to_duration(name: &str, minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidEnvVar(name.to_owned(), "value is too large".to_owned()))
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_host: get_optional_env("SMTP_HOST"),
            smtp_port: get_parsed_or_default("SMTP_PORT", "587")?,
            smtp_username: get_optional_env("SMTP_USERNAME"),
            smtp_password: get_optional_env("SMTP_PASSWORD").map(SecretString::from),
            from_address: get_env_or_default("EMAIL_FROM", "noreply@localhost"),
        })
    }
}

impl SmsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_url = get_optional_env("SMS_WEBHOOK_URL")
            .map(|raw| {
                url::Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("SMS_WEBHOOK_URL".to_owned(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            webhook_url,
            from_number: get_optional_env("SMS_FROM_NUMBER"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse an environment variable, falling back to a default.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a duration in whole seconds, falling back to a default.
fn get_secs_or(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let secs: u64 = get_parsed_or_default(key, &default.as_secs().to_string())?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Validate that the signing key meets minimum length requirements.
fn validate_secret_key(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}


#[cfg(test)]
pub use tests::test_config;
