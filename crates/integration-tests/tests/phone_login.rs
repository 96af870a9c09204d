//! Integration tests for phone OTP login.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The API server running (cargo run -p ecommerce-api)

use ecommerce_integration_tests::{
    api_base_url, client, db_pool, otp_attempts_per_day, unique_phone,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_daily_cap_returns_403() {
    let pool = db_pool().await;
    let phone = unique_phone();
    let cap = otp_attempts_per_day();

    for _ in 0..cap {
        sqlx::query("INSERT INTO shop.phone_token (phone_number, otp) VALUES ($1, '000000')")
            .bind(&phone)
            .execute(&pool)
            .await
            .expect("Failed to insert token");
    }

    let resp = client()
        .post(format!("{}/users/generate-otp/", api_base_url()))
        .json(&json!({"phone_number": phone}))
        .send()
        .await
        .expect("Failed to request OTP");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(
        body["reason"],
        format!("you can not have more than {cap} attempts per day, please try again tomorrow")
    );
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_wrong_otp_counts_attempt() {
    let pool = db_pool().await;
    let client = client();
    let base_url = api_base_url();

    let generated: Value = client
        .post(format!("{base_url}/users/generate-otp/"))
        .json(&json!({"phone_number": unique_phone()}))
        .send()
        .await
        .expect("Failed to request OTP")
        .json()
        .await
        .expect("Invalid JSON");
    let pk = generated["pk"].as_i64().expect("pk");

    let resp = client
        .post(format!("{base_url}/users/validate-otp/"))
        .json(&json!({"pk": pk, "otp": "not-the-code"}))
        .send()
        .await
        .expect("Failed to validate OTP");
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body, json!({"reason": "OTP doesn't exist"}));

    let (attempts, used): (i32, bool) =
        sqlx::query_as("SELECT attempts, used FROM shop.phone_token WHERE id = $1")
            .bind(i32::try_from(pk).expect("pk fits i32"))
            .fetch_one(&pool)
            .await
            .expect("token exists");
    assert_eq!(attempts, 1);
    assert!(!used);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_otp_is_single_use() {
    let pool = db_pool().await;
    let client = client();
    let base_url = api_base_url();

    let generated: Value = client
        .post(format!("{base_url}/users/generate-otp/"))
        .json(&json!({"phone_number": unique_phone()}))
        .send()
        .await
        .expect("Failed to request OTP")
        .json()
        .await
        .expect("Invalid JSON");
    let pk = generated["pk"].as_i64().expect("pk");
    let (otp,): (String,) = sqlx::query_as("SELECT otp FROM shop.phone_token WHERE id = $1")
        .bind(i32::try_from(pk).expect("pk fits i32"))
        .fetch_one(&pool)
        .await
        .expect("token exists");

    let resp = client
        .post(format!("{base_url}/users/validate-otp/"))
        .json(&json!({"pk": pk, "otp": otp}))
        .send()
        .await
        .expect("Failed to validate OTP");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert!(body["username"].as_str().is_some_and(|u| u.starts_with("user")));

    let resp = client
        .post(format!("{base_url}/users/validate-otp/"))
        .json(&json!({"pk": pk, "otp": otp}))
        .send()
        .await
        .expect("Failed to validate OTP");
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_daily_cap_holds_under_concurrent_requests() {
    let pool = db_pool().await;
    let phone = unique_phone();
    let cap = otp_attempts_per_day();
    let url = format!("{}/users/generate-otp/", api_base_url());

    // Separate clients so the per-IP rate limiter admits every request
    let mut requests = tokio::task::JoinSet::new();
    for _ in 0..cap + 10 {
        let request = client()
            .post(&url)
            .json(&json!({"phone_number": phone}));
        requests.spawn(async move { request.send().await.expect("Failed to request OTP").status() });
    }

    let mut issued = 0;
    while let Some(status) = requests.join_next().await {
        match status.expect("request task panicked") {
            StatusCode::OK => issued += 1,
            StatusCode::FORBIDDEN => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(issued, cap);

    let (stored,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM shop.phone_token WHERE phone_number = $1")
            .bind(&phone)
            .fetch_one(&pool)
            .await
            .expect("Failed to count tokens");
    assert_eq!(stored, i64::from(cap));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_phone_login_when_username_taken() {
    let pool = db_pool().await;
    let client = client();
    let base_url = api_base_url();
    let phone = unique_phone();
    let taken = format!("user{}", phone.trim_start_matches('+'));

    sqlx::query("INSERT INTO shop.user (username, email) VALUES ($1, $2)")
        .bind(&taken)
        .bind(format!("{taken}@example.com"))
        .execute(&pool)
        .await
        .expect("Failed to insert user");

    let generated: Value = client
        .post(format!("{base_url}/users/generate-otp/"))
        .json(&json!({"phone_number": phone}))
        .send()
        .await
        .expect("Failed to request OTP")
        .json()
        .await
        .expect("Invalid JSON");
    let pk = generated["pk"].as_i64().expect("pk");
    let (otp,): (String,) = sqlx::query_as("SELECT otp FROM shop.phone_token WHERE id = $1")
        .bind(i32::try_from(pk).expect("pk fits i32"))
        .fetch_one(&pool)
        .await
        .expect("token exists");

    let resp = client
        .post(format!("{base_url}/users/validate-otp/"))
        .json(&json!({"pk": pk, "otp": otp}))
        .send()
        .await
        .expect("Failed to validate OTP");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("Invalid JSON");
    let username = body["username"].as_str().expect("username");
    assert!(username.starts_with(&taken));
    assert_ne!(username, taken);
}
