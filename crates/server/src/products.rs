//! Product catalog: CRUD plus the active toggle.

use axum::extract::{Path, State};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

use quotedesk_core::domain::product::{Product, ProductDraft};
use quotedesk_core::ServiceError;
use quotedesk_db::repositories::{ProductRepository, SqlProductRepository};

use crate::app::AppState;
use crate::error::ApiError;
use crate::guard::{authenticate, require_admin};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/{id}", get(get_product).put(update_product))
        .route("/{id}", post(toggle_product_active).route_layer(from_fn(require_admin)))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

fn validate_draft(draft: &ProductDraft) -> Result<(), ApiError> {
    if draft.name.trim().is_empty() {
        return Err(ServiceError::validation("name is required").into());
    }
    if draft.description.trim().is_empty() {
        return Err(ServiceError::validation("description is required").into());
    }
    if !draft.price.is_finite() || draft.price < 0.0 {
        return Err(ServiceError::validation("price must be a non-negative number").into());
    }
    if !(0..=100).contains(&draft.tax) {
        return Err(ServiceError::validation("tax must be a percentage between 0 and 100").into());
    }
    if draft.stock < 0 {
        return Err(ServiceError::validation("stock must not be negative").into());
    }
    Ok(())
}

async fn create_product(
    State(state): State<AppState>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_draft(&draft)?;
    let product_id = SqlProductRepository::new(state.db_pool.clone()).create(&draft).await?;
    info!(event_name = "product.created", product_id, "product created");
    Ok(Json(json!({ "message": "product created", "product_id": product_id })))
}

async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(SqlProductRepository::new(state.db_pool.clone()).list().await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    let product = SqlProductRepository::new(state.db_pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("product"))?;
    Ok(Json(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_draft(&draft)?;
    if !SqlProductRepository::new(state.db_pool.clone()).update(id, &draft).await? {
        return Err(ServiceError::not_found("product").into());
    }
    Ok(Json(json!({ "message": "product updated" })))
}

async fn toggle_product_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let is_active = SqlProductRepository::new(state.db_pool.clone())
        .toggle_active(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("product"))?;

    info!(event_name = "product.toggled", product_id = id, is_active, "product active flag flipped");
    Ok(Json(json!({
        "message": if is_active { "product activated" } else { "product deactivated" },
        "is_active": is_active,
    })))
}
