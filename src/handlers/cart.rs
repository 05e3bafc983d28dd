use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CustomerIdentity;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::AppState;

/// Customer cart endpoints, all scoped to the resolved store.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/:id", put(update_item))
        .route("/items/:id", delete(remove_item))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub quantity: i32,
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get_cart(customer.user.id, customer.store.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let line = state
        .services
        .carts
        .add_item(
            customer.user.id,
            customer.store.id,
            payload.product_id,
            payload.quantity,
        )
        .await
        .map_err(map_service_error)?;
    Ok(created_response(line))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let line = state
        .services
        .carts
        .update_item_quantity(customer.user.id, id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(line))
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .carts
        .remove_item(customer.user.id, id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
