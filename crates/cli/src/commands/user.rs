//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! ECOM_USER_PASSWORD=... ecom-cli user create -u alice -e alice@example.com [--staff]
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `ECOM_USER_PASSWORD` - Password for the new user

use secrecy::{ExposeSecret, SecretString};

use ecommerce_api::services::auth::{AuthError, AuthService, Registration};

/// Create a verified user that can log in immediately.
///
/// # Errors
///
/// Returns an error if the password variable is missing, the input is
/// invalid, the email or username is taken, or the database fails.
pub async fn create(
    username: &str,
    email: &str,
    staff: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let password = std::env::var("ECOM_USER_PASSWORD")
        .map(SecretString::from)
        .map_err(|_| "ECOM_USER_PASSWORD not set")?;

    let registration = Registration::parse(email, username, password.expose_secret())
        .map_err(describe)?;

    let pool = super::connect().await?;
    let user = AuthService::new(&pool)
        .create_verified_user(&registration, staff)
        .await
        .map_err(describe)?;

    tracing::info!(
        user_id = %user.id,
        username = %user.username,
        staff,
        "User created successfully"
    );
    Ok(())
}

/// Flatten field errors into a readable message.
fn describe(error: AuthError) -> Box<dyn std::error::Error> {
    match error {
        AuthError::Validation(errors) => errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
            .into(),
        other => Box::new(other),
    }
}
