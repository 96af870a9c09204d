//! Password reset route handlers.
//!
//! Reset links carry the user id (URL-safe base64) and a stateless token.
//! The token stops working once the password changes or the user logs in.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, FieldErrors, Result};
use crate::routes::{FIELD_REQUIRED, body_errors, required};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetEmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialsValid {
    pub success: &'static str,
    pub uidb64: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SetNewPasswordRequest {
    pub password: Option<String>,
    pub token: Option<String>,
    pub uidb64: Option<String>,
}

/// POST /users/request-reset-email/
///
/// Always answers the same way so callers cannot probe for accounts.
#[instrument(skip_all)]
pub async fn request_reset_email(
    State(state): State<AppState>,
    body: std::result::Result<Json<ResetEmailRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = body.map_err(|rejection| AppError::Validation(body_errors(&rejection)))?;
    let mut errors = FieldErrors::new();
    let Some(email) = required(&mut errors, "email", body.email.as_deref()) else {
        return Err(AppError::Validation(errors));
    };

    let link = AuthService::new(state.pool())
        .reset_link(state.reset_tokens(), email)
        .await?;

    if let Some((link, to)) = link
        .as_ref()
        .and_then(|link| link.user.mail_address().map(|to| (link, to)))
    {
        let url = state.config().absolute_url(&format!(
            "/users/password-reset/{}/{}/",
            link.uidb64, link.token
        ));
        state.email().send_password_reset(to, &url).await?;
        tracing::info!(user_id = %link.user.id, "Password reset email sent");
    }

    Ok(Json(json!({
        "success": "We have sent you a link to reset your password"
    })))
}

/// GET /users/password-reset/{uidb64}/{token}/
#[instrument(skip_all)]
pub async fn check_token(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<Json<CredentialsValid>> {
    AuthService::new(state.pool())
        .check_reset_link(state.reset_tokens(), &uidb64, &token)
        .await
        .map_err(|e| match e {
            AuthError::InvalidResetLink => {
                AppError::InvalidLink("Token is not valid, please request a new one".to_owned())
            }
            other => AppError::Auth(other),
        })?;

    Ok(Json(CredentialsValid {
        success: "Credentials valid",
        uidb64,
        token,
    }))
}

/// PATCH /users/password-reset-complete/
#[instrument(skip_all)]
pub async fn set_new_password(
    State(state): State<AppState>,
    body: std::result::Result<Json<SetNewPasswordRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = body.map_err(|rejection| AppError::Validation(body_errors(&rejection)))?;

    let mut errors = FieldErrors::new();
    let password = body.password.as_deref();
    if password.is_none() {
        errors.add("password", FIELD_REQUIRED);
    }
    let token = required(&mut errors, "token", body.token.as_deref());
    let uidb64 = required(&mut errors, "uidb64", body.uidb64.as_deref());
    let (Some(password), Some(token), Some(uidb64)) = (password, token, uidb64) else {
        return Err(AppError::Validation(errors));
    };

    AuthService::new(state.pool())
        .complete_reset(state.reset_tokens(), uidb64, token, password)
        .await?;

    Ok(Json(json!({ "success": "Password reset complete" })))
}
