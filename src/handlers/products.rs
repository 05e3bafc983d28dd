use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, Uri},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::OwnerIdentity;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::services::catalog::ProductInput;
use crate::AppState;

/// Public storefront catalog endpoints, tenant-resolved per request.
pub fn storefront_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Owner-side store and product management.
pub fn owner_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_store))
        .route("/", get(list_owner_stores))
        .route("/:store_id/products", post(create_product))
        .route("/:store_id/products/:id", put(update_product))
        .route("/:store_id/products/:id", delete(delete_product))
        .route("/:store_id/products/:id/stock", put(adjust_stock))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStoreRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[validate(range(min = 0, message = "cannot be negative"))]
    pub quantity: i32,
    #[serde(default)]
    pub image: String,
}

impl From<ProductRequest> for ProductInput {
    fn from(req: ProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            quantity: req.quantity,
            image: req.image,
        }
    }
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .services
        .tenants
        .resolve(&headers, &uri)
        .await
        .map_err(map_service_error)?;
    let products = state
        .services
        .catalog
        .list_store_products(store.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state
        .services
        .tenants
        .resolve(&headers, &uri)
        .await
        .map_err(map_service_error)?;
    let product = state
        .services
        .catalog
        .get_product(store.id, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn create_store(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
    Json(payload): Json<CreateStoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let store = state
        .services
        .catalog
        .create_store(owner.user.id, &payload.name, &payload.description)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(store))
}

async fn list_owner_stores(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let stores = state
        .services
        .catalog
        .get_owner_stores(owner.user.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(stores))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(owner.user.id, store_id, payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .update_product(owner.user.id, store_id, id, payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i32,
}

async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .adjust_stock(owner.user.id, store_id, id, payload.delta)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    owner: OwnerIdentity,
    Path((store_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(owner.user.id, store_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}
