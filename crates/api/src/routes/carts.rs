//! Cart route handlers.
//!
//! Each user has one cart. Adding a product creates the cart and the entry on
//! first use and increments the entry's quantity afterwards.

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
    response::Redirect,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use ecommerce_core::{CartId, EntryId, ProductId, UserId};

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Cart, Entry, Product};
use crate::routes::path_id;
use crate::state::AppState;

/// Cart line in the response.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub id: EntryId,
    pub product: Product,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub line_total: Decimal,
}

impl From<Entry> for EntryView {
    fn from(entry: Entry) -> Self {
        Self {
            line_total: entry.line_total(),
            id: entry.id,
            product: entry.product,
            quantity: entry.quantity,
        }
    }
}

/// Cart detail response.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub user: UserId,
    pub entries: Vec<EntryView>,
    pub item_count: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub total: Decimal,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            total: cart.total(),
            item_count: cart.item_count(),
            id: cart.id,
            user: cart.user,
            entries: cart.entries.into_iter().map(EntryView::from).collect(),
        }
    }
}

/// GET /carts/{cart_id} - The caller's cart.
///
/// Another user's cart is reported as not found.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    cart_id: std::result::Result<Path<CartId>, PathRejection>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let cart_id = path_id(cart_id)?;
    CartRepository::new(state.pool())
        .get_for_user(cart_id, user.id)
        .await?
        .map(|cart| Json(CartView::from(cart)))
        .ok_or(AppError::NotFound)
}

/// GET|POST /carts/add/{product_id} - Add one unit and redirect to the cart.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    product_id: std::result::Result<Path<ProductId>, PathRejection>,
    RequireAuth(user): RequireAuth,
) -> Result<Redirect> {
    let product_id = path_id(product_id)?;
    let added = CartRepository::new(state.pool())
        .add_product(user.id, product_id)
        .await?;

    tracing::info!(
        cart_id = %added.cart,
        product_id = %product_id,
        quantity = added.quantity,
        "Added to cart"
    );

    Ok(Redirect::to(&format!("/carts/{}", added.cart)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use axum::http::StatusCode;
    use chrono::Utc;
    use ecommerce_core::{CategoryId, Price};

    use super::*;
    use crate::routes::test_support::{app, request, send};

    #[test]
    fn test_cart_view_totals() {
        let product = Product {
            id: ProductId::new(3),
            category: CategoryId::new(1),
            name: "Tea".to_owned(),
            description: String::new(),
            price: Price::from_cents(450).unwrap(),
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let view = CartView::from(Cart {
            id: CartId::new(9),
            user: UserId::new(2),
            entries: vec![Entry {
                id: EntryId::new(1),
                product,
                quantity: 2,
            }],
        });

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 9);
        assert_eq!(json["user"], 2);
        assert_eq!(json["entries"][0]["quantity"], 2);
        assert_eq!(json["entries"][0]["line_total"], "9.00");
        assert_eq!(json["entries"][0]["product"]["price"], "4.50");
        assert_eq!(json["item_count"], 2);
        assert_eq!(view.total, Decimal::from_str("9.00").unwrap());
    }

    #[tokio::test]
    async fn test_cart_requires_auth() {
        let (status, _) = send(app(), request("GET", "/carts/1", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(app(), request("POST", "/carts/add/1", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_numeric_ids_are_not_found() {
        for (method, uri) in [("GET", "/carts/abc"), ("POST", "/carts/add/1.5")] {
            let (status, body) = send(app(), request(method, uri, None)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body, serde_json::json!({"detail": "Not found."}));
        }
    }
}
