//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness check
//! GET  /health/ready                    - Readiness check (database)
//!
//! # Catalog
//! GET  /                                - Entry point links
//! GET  /category-list/                  - Categories
//! GET  /{category}/product-list/        - Products of a category (by name)
//! GET  /product-detail/{product_id}     - Product detail
//! GET  /api/products                    - Product listing
//! POST /api/products                    - Create product (staff)
//! GET  /api/products/{id}               - Product detail
//! GET  /api/categories                  - Categories
//!
//! # Carts (requires auth)
//! GET  /carts/{cart_id}                 - Cart detail
//! GET|POST /carts/add/{product_id}      - Add one unit, redirect to the cart
//!
//! # Users
//! POST  /users/register/                - Register, email verification link
//! GET   /users/email-verify/?token=     - Verify email
//! POST  /users/login/                   - Email/password login
//! POST  /users/logout/                  - Blacklist refresh token (requires auth)
//! POST  /users/token/refresh/           - New access token
//! POST  /users/request-reset-email/     - Email a password reset link
//! GET   /users/password-reset/{uidb64}/{token}/ - Check reset link
//! PATCH /users/password-reset-complete/ - Set new password
//! POST  /users/generate-otp/            - Send phone OTP
//! POST  /users/validate-otp/            - Exchange OTP for tokens
//! ```

pub mod carts;
pub mod catalog;
pub mod password_reset;
pub mod phone;
pub mod users;

use axum::{
    Router,
    extract::{
        Path,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{get, patch, post},
};

use crate::error::{AppError, FieldErrors};
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Message used for a missing required field.
pub(crate) const FIELD_REQUIRED: &str = "This field is required.";

/// Field errors for a body that could not be parsed at all.
pub(crate) fn body_errors(rejection: &JsonRejection) -> FieldErrors {
    FieldErrors::single("non_field_errors", rejection.body_text())
}

/// Unwrap a numeric path segment; anything unparsable is not found.
pub(crate) fn path_id<T>(path: Result<Path<T>, PathRejection>) -> crate::error::Result<T> {
    path.map(|Path(id)| id).map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "Unparsable path id");
        AppError::NotFound
    })
}

/// Take a required string field, recording an error when missing or blank.
pub(crate) fn required<'a>(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        Some(_) => {
            errors.add(field, "This field may not be blank.");
            None
        }
        None => {
            errors.add(field, FIELD_REQUIRED);
            None
        }
    }
}

/// Catalog routes (public reads, staff writes).
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::home))
        .route("/category-list/", get(catalog::list_categories))
        .route("/{category}/product-list/", get(catalog::products_in_category))
        .route("/product-detail/{product_id}", get(catalog::show_product))
        .route(
            "/api/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route("/api/products/{id}", get(catalog::show_product))
        .route("/api/categories", get(catalog::list_categories))
}

/// Cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/{cart_id}", get(carts::show))
        .route("/add/{product_id}", get(carts::add).post(carts::add))
}

/// User account routes.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register/", post(users::register))
        .route("/email-verify/", get(users::verify_email))
        .route("/login/", post(users::login))
        .route("/logout/", post(users::logout))
        .route("/token/refresh/", post(users::refresh))
        .route("/request-reset-email/", post(password_reset::request_reset_email))
        .route(
            "/password-reset/{uidb64}/{token}/",
            get(password_reset::check_token),
        )
        .route(
            "/password-reset-complete/",
            patch(password_reset::set_new_password),
        )
        .route("/generate-otp/", post(phone::generate_otp))
        .route("/validate-otp/", post(phone::validate_otp))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes().layer(auth_rate_limiter()))
        .nest("/carts", cart_routes().layer(api_rate_limiter()))
        .merge(catalog_routes().layer(api_rate_limiter()))
}
