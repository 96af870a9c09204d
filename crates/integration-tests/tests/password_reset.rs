//! Integration tests for the password reset flow.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The API server running with the same `API_SECRET_KEY`

use ecommerce_api::config::TokenConfig;
use ecommerce_api::services::auth::{AuthService, Registration};
use ecommerce_api::services::password_reset::PasswordResetTokens;
use ecommerce_integration_tests::{api_base_url, client, db_pool, secret_key, unique_suffix};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_unknown_email_gets_same_answer() {
    let resp = client()
        .post(format!("{}/users/request-reset-email/", api_base_url()))
        .json(&json!({"email": format!("nobody-{}@example.com", unique_suffix())}))
        .send()
        .await
        .expect("Failed to request reset");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(
        body,
        json!({"success": "We have sent you a link to reset your password"})
    );
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_reset_link_works_once() {
    let pool = db_pool().await;
    let client = client();
    let base_url = api_base_url();
    let suffix = unique_suffix();
    let email = format!("reset-{suffix}@example.com");

    let auth = AuthService::new(&pool);
    let registration =
        Registration::parse(&email, &format!("r{suffix}"), "old password").expect("valid input");
    auth.create_verified_user(&registration, false)
        .await
        .expect("user created");

    let tokens = PasswordResetTokens::new(
        secret_key(),
        TokenConfig::default().password_reset_timeout,
    );
    let link = auth
        .reset_link(&tokens, &email)
        .await
        .expect("lookup works")
        .expect("user has a reset link");

    let check_url = format!("{base_url}/users/password-reset/{}/{}/", link.uidb64, link.token);
    let resp = client.get(&check_url).send().await.expect("Failed to check");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["success"], "Credentials valid");
    assert_eq!(body["uidb64"], link.uidb64);

    let resp = client
        .patch(format!("{base_url}/users/password-reset-complete/"))
        .json(&json!({"password": "new password", "token": link.token, "uidb64": link.uidb64}))
        .send()
        .await
        .expect("Failed to complete reset");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(&check_url).send().await.expect("Failed to check");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{base_url}/users/login/"))
        .json(&json!({"email": email, "password": "new password"}))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);
}
