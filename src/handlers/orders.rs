use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{CustomerIdentity, OwnerIdentity};
use crate::entities::OrderStatus;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::AppState;

/// Customer order endpoints.
pub fn customer_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_orders))
        .route("/pending", get(get_pending_order))
        .route("/:id", get(get_order))
        .route("/:id/complete", post(mark_completed))
}

/// Store owner order endpoints, nested under the owner's store.
pub fn owner_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:store_id/orders", get(list_store_orders))
        .route("/:store_id/orders/:order_id/status", put(update_order_status))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub shipping_info: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .create_order(customer.user.id, customer.store.id, &payload.shipping_info)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .get_orders(customer.user.id, customer.store.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(orders))
}

async fn get_pending_order(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_pending_order(customer.user.id, customer.store.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

/// One order with its snapshot lines.
async fn get_order(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = &state.services.orders;
    let order = orders
        .get_customer_order(customer.user.id, id)
        .await
        .map_err(map_service_error)?;
    let lines = orders
        .get_order_products(order.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(serde_json::json!({
        "order": order,
        "items": lines,
    })))
}

async fn mark_completed(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .mark_completed(customer.user.id, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

async fn list_store_orders(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
    Path(store_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .get_store_orders(owner.user.id, store_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(orders))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
    Path((store_id, order_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_order_status(owner.user.id, order_id, store_id, payload.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}
