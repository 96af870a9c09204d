//! Integration test helpers for the ecommerce API.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and start the API
//! ecom-cli migrate
//! cargo run -p ecommerce-api
//!
//! # Run the HTTP tests (ignored by default)
//! cargo test -p ecommerce-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `API_BASE_URL` - Running server (default `http://localhost:8000`)
//! - `API_DATABASE_URL` (or `DATABASE_URL`) - Same database as the server
//! - `API_SECRET_KEY` - Same secret as the server, for hand-made tokens
//! - `PHONE_LOGIN_ATTEMPTS` - The server's daily OTP cap (default 10)

#![allow(clippy::missing_panics_doc)]

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL of the running API.
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_owned())
        .trim_end_matches('/')
        .to_owned()
}

/// Server secret shared with the test process.
#[must_use]
pub fn secret_key() -> SecretString {
    std::env::var("API_SECRET_KEY")
        .map(SecretString::from)
        .expect("API_SECRET_KEY must match the running server")
}

/// Daily OTP cap configured on the server.
#[must_use]
pub fn otp_attempts_per_day() -> u32 {
    std::env::var("PHONE_LOGIN_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}

/// Connect to the API database.
pub async fn db_pool() -> PgPool {
    let url = std::env::var("API_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("API_DATABASE_URL must be set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to database")
}

/// HTTP client that does not follow redirects.
///
/// Each client presents its own documentation-range IPv6 address in
/// `X-Forwarded-For`, so tests get separate rate limit buckets.
#[must_use]
pub fn client() -> Client {
    let id = Uuid::new_v4().as_u128();
    let ip = format!(
        "2001:db8::{:x}:{:x}",
        (id >> 16) & 0xffff,
        id & 0xffff
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&ip).expect("valid header value"),
    );

    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

/// A phone number nobody else uses.
#[must_use]
pub fn unique_phone() -> String {
    let digits = Uuid::new_v4().as_u128() % 10_000_000_000;
    format!("+1{digits:010}")
}

/// A unique alphanumeric suffix for usernames and emails.
#[must_use]
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Log in through the phone OTP flow, reading the code from the database.
///
/// Returns the response body `{username, tokens: {refresh, access}}`.
pub async fn phone_login(client: &Client, pool: &PgPool) -> Value {
    let base_url = api_base_url();
    let phone = unique_phone();

    let generated: Value = client
        .post(format!("{base_url}/users/generate-otp/"))
        .json(&json!({ "phone_number": phone }))
        .send()
        .await
        .expect("Failed to request OTP")
        .json()
        .await
        .expect("Invalid generate-otp response");
    let pk = generated["pk"].as_i64().expect("generate-otp returns pk");

    let (otp,): (String,) = sqlx::query_as("SELECT otp FROM shop.phone_token WHERE id = $1")
        .bind(i32::try_from(pk).expect("pk fits i32"))
        .fetch_one(pool)
        .await
        .expect("OTP row exists");

    let resp = client
        .post(format!("{base_url}/users/validate-otp/"))
        .json(&json!({ "pk": pk, "otp": otp }))
        .send()
        .await
        .expect("Failed to validate OTP");
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    resp.json().await.expect("Invalid validate-otp response")
}

/// Insert a category and a product directly, returning the product id.
pub async fn create_product(pool: &PgPool, price: &str) -> i32 {
    let suffix = unique_suffix();
    let (category_id,): (i32,) =
        sqlx::query_as("INSERT INTO shop.category (name) VALUES ($1) RETURNING id")
            .bind(format!("test-{suffix}"))
            .fetch_one(pool)
            .await
            .expect("Failed to insert category");

    let (product_id,): (i32,) = sqlx::query_as(
        r"
        INSERT INTO shop.product (category_id, name, description, price)
        VALUES ($1, $2, '', $3::numeric)
        RETURNING id
        ",
    )
    .bind(category_id)
    .bind(format!("Product {suffix}"))
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("Failed to insert product");

    product_id
}
