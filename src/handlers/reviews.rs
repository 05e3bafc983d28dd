use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CustomerIdentity;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::AppState;

/// Review endpoints, nested under storefront products. Reading reviews is
/// public; writing one requires a customer session and an eligible order.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id/reviews", get(get_product_reviews))
        .route("/:id/reviews", post(create_review))
}

/// Customer-side review listing, nested under orders: the fulfilled
/// orders whose products can still be reviewed.
pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new().route("/reviewable", get(reviewable_orders))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: i32,
    pub comment: Option<String>,
}

async fn get_product_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reviews = state
        .services
        .reviews
        .get_product_reviews(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(reviews))
}

async fn reviewable_orders(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .reviews
        .reviewable_orders(customer.user.id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(orders))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let review = state
        .services
        .reviews
        .create_review(
            customer.user.id,
            id,
            payload.rating,
            payload.comment.as_deref().unwrap_or_default(),
        )
        .await
        .map_err(map_service_error)?;
    Ok(created_response(review))
}
