//! Phone OTP login route handlers.
//!
//! A code is sent by SMS, then exchanged once for a token pair. Users are
//! created on first login and count as verified.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use ecommerce_core::{PhoneNumber, PhoneTokenId};

use crate::db::PhoneTokenRepository;
use crate::error::{AppError, FieldErrors, Result};
use crate::models::TokenPair;
use crate::routes::{FIELD_REQUIRED, body_errors, required};
use crate::services::auth::AuthService;
use crate::services::otp::start_of_day;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateOtpRequest {
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateOtpResponse {
    pub pk: PhoneTokenId,
    pub phone_number: PhoneNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_mode_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateOtpRequest {
    pub pk: Option<i32>,
    pub otp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateOtpResponse {
    pub username: String,
    pub tokens: TokenPair,
}

fn not_acceptable(errors: &FieldErrors) -> AppError {
    AppError::NotAcceptable(json!(errors))
}

/// POST /users/generate-otp/
#[instrument(skip_all)]
pub async fn generate_otp(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerateOtpRequest>, JsonRejection>,
) -> Result<Json<GenerateOtpResponse>> {
    let Json(body) = body.map_err(|rejection| not_acceptable(&body_errors(&rejection)))?;

    let mut errors = FieldErrors::new();
    let Some(raw) = required(&mut errors, "phone_number", body.phone_number.as_deref()) else {
        return Err(not_acceptable(&errors));
    };
    let phone = PhoneNumber::parse(raw).map_err(|e| {
        not_acceptable(&FieldErrors::single("phone_number", e.to_string()))
    })?;

    let repo = PhoneTokenRepository::new(state.pool());
    let policy = state.otp();

    let mut issue = repo.begin_issue(&phone).await?;
    let issued_today = issue.count_since(start_of_day(Utc::now())).await?;
    policy.check_daily_limit(issued_today)?;

    let otp = policy.new_code();
    let token = issue.create(&otp).await?;
    state
        .sms()
        .send_otp(&phone, &otp, state.config().phone_login.validity)
        .await?;

    tracing::info!(token_id = %token.id, issued_today = issued_today + 1, "OTP issued");
    Ok(Json(GenerateOtpResponse {
        pk: token.id,
        phone_number: token.phone_number,
        debug_mode_token: policy.debug().then_some(otp),
    }))
}

/// POST /users/validate-otp/
#[instrument(skip_all)]
pub async fn validate_otp(
    State(state): State<AppState>,
    body: std::result::Result<Json<ValidateOtpRequest>, JsonRejection>,
) -> Result<Json<ValidateOtpResponse>> {
    let Json(body) = body.map_err(|rejection| not_acceptable(&body_errors(&rejection)))?;

    let mut errors = FieldErrors::new();
    if body.pk.is_none() {
        errors.add("pk", FIELD_REQUIRED);
    }
    let otp = required(&mut errors, "otp", body.otp.as_deref());
    let (Some(pk), Some(otp)) = (body.pk, otp) else {
        return Err(not_acceptable(&errors));
    };

    let valid_since = state.otp().valid_since(Utc::now());
    let Some(token) = PhoneTokenRepository::new(state.pool())
        .consume(PhoneTokenId::new(pk), otp, valid_since)
        .await?
    else {
        tracing::warn!(token_id = pk, "OTP rejected");
        return Err(AppError::NotAcceptable(json!("OTP doesn't exist")));
    };

    let user = AuthService::new(state.pool())
        .login_with_phone(&token.phone_number)
        .await?;
    let tokens = state.tokens().issue_pair(user.id)?;

    tracing::info!(user_id = %user.id, attempts = token.attempts, "User logged in by phone");
    Ok(Json(ValidateOtpResponse {
        username: user.username.into(),
        tokens,
    }))
}
