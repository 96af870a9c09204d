//! Catalog route handlers: categories and products.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::instrument;

use ecommerce_core::ProductId;

use crate::db::{CatalogRepository, RepositoryError};
use crate::error::{AppError, FieldErrors, Result};
use crate::middleware::RequireStaff;
use crate::models::{Category, NewProduct, Product};
use crate::routes::{body_errors, path_id};
use crate::state::AppState;

/// GET / - Entry point links.
pub async fn home() -> Json<Value> {
    Json(json!({ "category_list": "/category-list/" }))
}

/// GET /category-list/ and /api/categories
#[instrument(skip(state))]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CatalogRepository::new(state.pool()).list_categories().await?;
    Ok(Json(categories))
}

/// GET /api/products
#[instrument(skip(state))]
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = CatalogRepository::new(state.pool()).list_products().await?;
    Ok(Json(products))
}

/// GET /{category}/product-list/
///
/// Unknown categories give an empty list rather than 404.
#[instrument(skip(state))]
pub async fn products_in_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Product>>> {
    let products = CatalogRepository::new(state.pool())
        .list_products_in_category(&category)
        .await?;
    Ok(Json(products))
}

/// GET /product-detail/{product_id} and /api/products/{id}
#[instrument(skip(state))]
pub async fn show_product(
    State(state): State<AppState>,
    id: std::result::Result<Path<ProductId>, PathRejection>,
) -> Result<Json<Product>> {
    let id = path_id(id)?;
    CatalogRepository::new(state.pool())
        .get_product(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// POST /api/products - Create a product (staff only).
#[instrument(skip_all, fields(user_id = %staff.id))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    body: std::result::Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>)> {
    let Json(new) = body.map_err(|rejection| AppError::Validation(body_errors(&rejection)))?;

    let problems = new.validate();
    if !problems.is_empty() {
        let mut errors = FieldErrors::new();
        for (field, message) in problems {
            errors.add(field, message);
        }
        return Err(AppError::Validation(errors));
    }

    let product = CatalogRepository::new(state.pool())
        .create_product(&new)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::Validation(FieldErrors::single(
                "category",
                format!(
                    "Invalid pk \"{}\" - object does not exist.",
                    new.category
                ),
            )),
            other => AppError::Database(other),
        })?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}
