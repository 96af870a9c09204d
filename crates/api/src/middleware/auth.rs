//! Authentication extractors.
//!
//! Requests authenticate with an access JWT in the `Authorization: Bearer`
//! header. The token's user must still exist and be active.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::tokens::bearer_token;
use crate::state::AppState;

const NOT_PROVIDED: &str = "Authentication credentials were not provided.";
const INVALID_TOKEN: &str = "Given token not valid for any token type";
const USER_INACTIVE: &str = "User is inactive";
const NOT_STAFF: &str = "You do not have permission to perform this action.";

/// Extractor that requires an authenticated user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| AppError::Unauthorized(NOT_PROVIDED.to_owned()))?;

        let claims = state
            .tokens()
            .validate_access(token)
            .map_err(|_| AppError::Unauthorized(INVALID_TOKEN.to_owned()))?;

        let user = UserRepository::new(state.pool())
            .get_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.to_owned()))?;

        if !user.is_active {
            return Err(AppError::Unauthorized(USER_INACTIVE.to_owned()));
        }

        set_sentry_user(&user.id);
        Ok(Self(user))
    }
}

/// Extractor that requires an authenticated staff user.
pub struct RequireStaff(pub User);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::Forbidden(NOT_STAFF.to_owned()));
        }
        Ok(Self(user))
    }
}
