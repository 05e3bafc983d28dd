use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CustomerIdentity;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::services::payments::CardDetails;
use crate::AppState;

/// Payment capture endpoint, nested under customer orders.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/payment", post(process_payment))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub card_number: String,
    #[validate(length(min = 1, message = "is required"))]
    pub cvv: String,
    #[validate(length(min = 1, message = "is required"))]
    pub expiry: String,
}

async fn process_payment(
    State(state): State<Arc<AppState>>,
    customer: CustomerIdentity,
    Path(id): Path<Uuid>,
    Json(payload): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .payments
        .process_payment(
            customer.user.id,
            id,
            CardDetails {
                card_number: payload.card_number,
                cvv: payload.cvv,
                expiry: payload.expiry,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}
