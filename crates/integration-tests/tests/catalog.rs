//! Integration tests for health and catalog endpoints.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - The API server running (cargo run -p ecommerce-api)

use ecommerce_integration_tests::{api_base_url, client, create_product, db_pool};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_health_endpoints() {
    let client = client();
    let base_url = api_base_url();

    let resp = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("Failed to call /health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("Failed to call /health/ready");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_home_links_category_list() {
    let body: Value = client()
        .get(format!("{}/", api_base_url()))
        .send()
        .await
        .expect("Failed to call /")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(body, json!({"category_list": "/category-list/"}));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_product_listed_under_its_category() {
    let pool = db_pool().await;
    let product_id = create_product(&pool, "4.50").await;
    let client = client();
    let base_url = api_base_url();

    let product: Value = client
        .get(format!("{base_url}/product-detail/{product_id}"))
        .send()
        .await
        .expect("Failed to get product")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(product["id"], product_id);
    assert_eq!(product["price"], "4.50");

    let categories: Vec<Value> = client
        .get(format!("{base_url}/category-list/"))
        .send()
        .await
        .expect("Failed to list categories")
        .json()
        .await
        .expect("Invalid JSON");
    let category = categories
        .iter()
        .find(|c| c["id"] == product["category"])
        .expect("product category is listed");
    let name = category["name"].as_str().expect("category name");

    let products: Vec<Value> = client
        .get(format!("{base_url}/{name}/product-list/"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(products.len(), 1);
    assert_eq!(products.first().map(|p| &p["id"]), Some(&json!(product_id)));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_unknown_product_is_404() {
    let resp = client()
        .get(format!("{}/product-detail/2147483647", api_base_url()))
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body, json!({"detail": "Not found."}));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_unknown_category_is_empty() {
    let products: Vec<Value> = client()
        .get(format!("{}/no-such-category-xyz/product-list/", api_base_url()))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Invalid JSON");
    assert!(products.is_empty());
}
