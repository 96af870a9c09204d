//! Integration tests for registration, verification, login and tokens.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The API server running with the same `API_SECRET_KEY`

use std::time::Duration;

use ecommerce_api::config::TokenConfig;
use ecommerce_api::services::tokens::TokenService;
use ecommerce_core::UserId;
use ecommerce_integration_tests::{
    api_base_url, client, db_pool, phone_login, secret_key, unique_suffix,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_register_verify_then_login() {
    let pool = db_pool().await;
    let client = client();
    let base_url = api_base_url();
    let suffix = unique_suffix();
    let email = format!("user-{suffix}@example.com");
    let password = "correct horse";

    let resp = client
        .post(format!("{base_url}/users/register/"))
        .json(&json!({"email": email, "username": format!("u{suffix}"), "password": password}))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{base_url}/users/login/"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["detail"], "Email is not verified");

    let (user_id,): (i32,) = sqlx::query_as("SELECT id FROM shop.user WHERE email = $1")
        .bind(&email)
        .fetch_one(&pool)
        .await
        .expect("registered user exists");
    let token = TokenService::new(&secret_key(), &TokenConfig::default())
        .issue_access(UserId::new(user_id))
        .expect("token issued");

    let resp = client
        .get(format!("{base_url}/users/email-verify/?token={token}"))
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body, json!({"success": "Successfully activated"}));

    let resp = client
        .post(format!("{base_url}/users/login/"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["email"], email);
    assert!(body["tokens"]["access"].is_string());
    assert!(body["tokens"]["refresh"].is_string());
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_expired_verification_token() {
    let tokens = TokenService::new(
        &secret_key(),
        &TokenConfig {
            access_lifetime: Duration::ZERO,
            ..TokenConfig::default()
        },
    );
    let token = tokens.issue_access(UserId::new(1)).expect("token issued");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let resp = client()
        .get(format!("{}/users/email-verify/?token={token}", api_base_url()))
        .send()
        .await
        .expect("Failed to verify");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body, json!({"error": "Activation expired"}));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_duplicate_registration_rejected() {
    let pool = db_pool().await;
    let client = client();
    let login = phone_login(&client, &pool).await;
    let username = login["username"].as_str().expect("username");

    let resp = client
        .post(format!("{}/users/register/", api_base_url()))
        .json(&json!({
            "email": format!("dup-{}@example.com", unique_suffix()),
            "username": username,
            "password": "secret123",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["username"][0], "user with this username already exists.");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_logged_out_refresh_token_cannot_refresh() {
    let pool = db_pool().await;
    let client = client();
    let base_url = api_base_url();
    let login = phone_login(&client, &pool).await;
    let access = login["tokens"]["access"].as_str().expect("access");
    let refresh = login["tokens"]["refresh"].as_str().expect("refresh");

    let resp = client
        .post(format!("{base_url}/users/token/refresh/"))
        .json(&json!({"refresh": refresh}))
        .send()
        .await
        .expect("Failed to refresh");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base_url}/users/logout/"))
        .bearer_auth(access)
        .json(&json!({"refresh": refresh}))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client
        .post(format!("{base_url}/users/token/refresh/"))
        .json(&json!({"refresh": refresh}))
        .send()
        .await
        .expect("Failed to refresh");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_logout_twice_rejected() {
    let pool = db_pool().await;
    let client = client();
    let base_url = api_base_url();
    let login = phone_login(&client, &pool).await;
    let access = login["tokens"]["access"].as_str().expect("access");
    let refresh = login["tokens"]["refresh"].as_str().expect("refresh");

    let logout = || {
        client
            .post(format!("{base_url}/users/logout/"))
            .bearer_auth(access)
            .json(&json!({"refresh": refresh}))
            .send()
    };

    let resp = logout().await.expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = logout().await.expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body, json!({"error": "Token is expired or invalid"}));
}
