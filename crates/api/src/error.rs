//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Client errors use one of four JSON shapes:
//!
//! - `{"detail": ".."}` for authentication, permission and not-found errors
//! - `{"error": ".."}` for bad tokens and links
//! - `{"reason": ..}` for phone login rejections
//! - `{"field": [".."]}` for input validation

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::email::EmailError;
use crate::services::otp::OtpError;
use crate::services::sms::SmsError;
use crate::services::tokens::TokenError;

/// Validation messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A single-field error set.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Iterate over `(field, messages)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Email delivery failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// SMS delivery failed.
    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),

    /// Phone login policy rejected the request.
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    /// Token issuing failed.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Request body failed validation.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Phone login request could not be processed (406).
    #[error("Not acceptable: {0}")]
    NotAcceptable(serde_json::Value),

    /// Resource not found.
    #[error("Not found")]
    NotFound,

    /// User is not authenticated or credentials were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A token or link was rejected.
    #[error("Invalid link: {0}")]
    InvalidLink(String),

}

impl AppError {
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(err) => !matches!(err, RepositoryError::NotFound),
            Self::Auth(err) => matches!(err, AuthError::Repository(_) | AuthError::PasswordHash),
            Self::Email(_) | Self::Sms(_) | Self::Token(_) => true,
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound => StatusCode::NOT_FOUND,
            Self::Auth(err) => match err {
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials
                | AuthError::AccountDisabled
                | AuthError::EmailNotVerified
                | AuthError::InvalidResetLink => StatusCode::UNAUTHORIZED,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Sms(_) => StatusCode::BAD_GATEWAY,
            Self::Otp(_) | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::Unauthorized(_) | Self::InvalidLink(_) => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Email(_) | Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Don't expose internal error details to clients
    fn body(&self) -> serde_json::Value {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound => {
                json!({"detail": "Not found."})
            }
            Self::Auth(err) => match err {
                AuthError::Validation(errors) => json!(errors),
                AuthError::InvalidCredentials => json!({"detail": "Invalid credentials, try again"}),
                AuthError::AccountDisabled => json!({"detail": "Account disabled, contact admin"}),
                AuthError::EmailNotVerified => json!({"detail": "Email is not verified"}),
                AuthError::UserNotFound => json!({"detail": "Not found."}),
                AuthError::InvalidResetLink => json!({"error": "The reset link is invalid"}),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    json!({"detail": "Internal server error"})
                }
            },
            Self::Sms(_) => json!({"detail": "Could not send SMS, please try again later"}),
            Self::Otp(err) => json!({"reason": err.to_string()}),
            Self::Validation(errors) => json!(errors),
            Self::NotAcceptable(reason) => json!({"reason": reason}),
            Self::Unauthorized(message) | Self::Forbidden(message) => json!({"detail": message}),
            Self::BadRequest(message) | Self::InvalidLink(message) => json!({"error": message}),
            Self::Database(_) | Self::Email(_) | Self::Token(_) => {
                json!({"detail": "Internal server error"})
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
