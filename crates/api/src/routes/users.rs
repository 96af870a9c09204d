//! User account route handlers: registration, verification, login and tokens.

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::TokenBlacklistRepository;
use crate::error::{AppError, FieldErrors, Result};
use crate::middleware::RequireAuth;
use crate::models::TokenPair;
use crate::routes::{body_errors, required};
use crate::services::auth::{AuthService, Registration};
use crate::services::tokens::TokenError;
use crate::state::AppState;

const TOKEN_INVALID: &str = "Token is expired or invalid";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: Option<String>,
    pub username: String,
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /users/register/
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    body: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(body) = body.map_err(|rejection| AppError::Validation(body_errors(&rejection)))?;

    let mut errors = FieldErrors::new();
    let email = required(&mut errors, "email", body.email.as_deref());
    let username = required(&mut errors, "username", body.username.as_deref());
    // Passwords are not trimmed
    let password = match body.password.as_deref() {
        Some(p) => Some(p),
        None => {
            errors.add("password", crate::routes::FIELD_REQUIRED);
            None
        }
    };
    let (Some(email), Some(username), Some(password)) = (email, username, password) else {
        return Err(AppError::Validation(errors));
    };

    let registration = Registration::parse(email, username, password)?;
    let user = AuthService::new(state.pool()).register(&registration).await?;

    let token = state.tokens().issue_access(user.id)?;
    let url = state
        .config()
        .absolute_url(&format!("/users/email-verify/?token={token}"));
    state
        .email()
        .send_verification(&registration.email, user.username.as_str(), &url)
        .await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": "User created, you can now activate your account using the email we sent you"
        })),
    ))
}

/// GET /users/email-verify/?token=
#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<Value>> {
    let token = query
        .token
        .ok_or_else(|| AppError::BadRequest("Invalid token".to_owned()))?;

    let claims = state.tokens().validate_access(&token).map_err(|e| match e {
        TokenError::Expired => AppError::BadRequest("Activation expired".to_owned()),
        _ => AppError::BadRequest("Invalid token".to_owned()),
    })?;

    let newly_verified = AuthService::new(state.pool())
        .verify_email(claims.user_id)
        .await
        .map_err(|e| match e {
            crate::services::auth::AuthError::UserNotFound => {
                AppError::BadRequest("Invalid token".to_owned())
            }
            other => AppError::Auth(other),
        })?;

    if newly_verified {
        tracing::info!(user_id = %claims.user_id, "Email verified");
    }
    Ok(Json(json!({ "success": "Successfully activated" })))
}

/// POST /users/login/
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = body.map_err(|rejection| AppError::Validation(body_errors(&rejection)))?;

    let mut errors = FieldErrors::new();
    let email = required(&mut errors, "email", body.email.as_deref());
    let password = body.password.as_deref().filter(|p| !p.is_empty());
    if password.is_none() {
        errors.add("password", crate::routes::FIELD_REQUIRED);
    }
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation(errors));
    };

    let user = AuthService::new(state.pool()).login(email, password).await?;
    let tokens = state.tokens().issue_pair(user.id)?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(LoginResponse {
        email: user.email.map(String::from),
        username: user.username.into(),
        tokens,
    }))
}

/// POST /users/logout/ - Blacklist the given refresh token.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(body) = body.map_err(|rejection| AppError::Validation(body_errors(&rejection)))?;
    let mut errors = FieldErrors::new();
    let Some(refresh) = required(&mut errors, "refresh", body.refresh.as_deref()) else {
        return Err(AppError::Validation(errors));
    };

    let claims = state
        .tokens()
        .validate_refresh(refresh)
        .map_err(|_| AppError::BadRequest(TOKEN_INVALID.to_owned()))?;
    if claims.user_id != user.id {
        return Err(AppError::BadRequest(TOKEN_INVALID.to_owned()));
    }

    let added = TokenBlacklistRepository::new(state.pool())
        .add(claims.jti, claims.user_id, claims.expires_at())
        .await?;
    if !added {
        return Err(AppError::BadRequest(TOKEN_INVALID.to_owned()));
    }

    tracing::info!("User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/token/refresh/ - Exchange a refresh token for an access token.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    body: std::result::Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(body) = body.map_err(|rejection| AppError::Validation(body_errors(&rejection)))?;
    let mut errors = FieldErrors::new();
    let Some(refresh) = required(&mut errors, "refresh", body.refresh.as_deref()) else {
        return Err(AppError::Validation(errors));
    };

    let rejected = || AppError::Unauthorized("Token is invalid or expired".to_owned());

    let claims = state
        .tokens()
        .validate_refresh(refresh)
        .map_err(|_| rejected())?;
    if TokenBlacklistRepository::new(state.pool())
        .contains(claims.jti)
        .await?
    {
        return Err(AppError::Unauthorized("Token is blacklisted".to_owned()));
    }

    let access = state.tokens().issue_access(claims.user_id)?;
    Ok(Json(json!({ "access": access })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use ecommerce_core::UserId;
    use serde_json::json;
    use uuid::Uuid;

    use crate::config::test_config;
    use crate::routes::test_support::{app, request, send};
    use crate::services::tokens::{Claims, TokenService, TokenType};

    fn tokens() -> TokenService {
        let config = test_config();
        TokenService::new(&config.secret_key, &config.tokens)
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let (status, body) = send(
            app(),
            request(
                "POST",
                "/users/register/",
                Some(json!({"email": "bad", "username": "no spaces", "password": "123"})),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["email"][0], "Enter a valid email address.");
        assert_eq!(
            body["username"][0],
            "The username should only contain alphanumeric characters"
        );
        assert_eq!(body["password"][0], "Ensure this field has at least 6 characters.");
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let (status, body) = send(app(), request("POST", "/users/register/", Some(json!({})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["email"][0], "This field is required.");
        assert_eq!(body["username"][0], "This field is required.");
        assert_eq!(body["password"][0], "This field is required.");
    }

    #[tokio::test]
    async fn test_verify_email_missing_or_garbage_token() {
        let (status, body) = send(app(), request("GET", "/users/email-verify/", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid token"}));

        let (status, body) = send(
            app(),
            request("GET", "/users/email-verify/?token=garbage", None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid token"}));
    }

    #[tokio::test]
    async fn test_verify_email_expired_token() {
        let now = Utc::now().timestamp();
        let token = tokens()
            .encode(&Claims {
                token_type: TokenType::Access,
                user_id: UserId::new(1),
                jti: Uuid::new_v4(),
                iat: now - 1000,
                exp: now - 10,
            })
            .unwrap();

        let (status, body) = send(
            app(),
            request("GET", &format!("/users/email-verify/?token={token}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Activation expired"}));
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let (status, body) = send(
            app(),
            request("POST", "/users/login/", Some(json!({"email": "a@b.co"}))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"password": ["This field is required."]}));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let access = tokens().issue_access(UserId::new(1)).unwrap();
        let (status, _) = send(
            app(),
            request("POST", "/users/token/refresh/", Some(json!({"refresh": access}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_requires_auth() {
        let (status, _) = send(
            app(),
            request("POST", "/users/logout/", Some(json!({"refresh": "x"}))),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
