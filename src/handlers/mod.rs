pub mod auth;
pub mod cart;
pub mod common;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::AppState;

/// Composes every API route under `/api`.
///
/// Customer-facing routes resolve their tenant per request; owner routes
/// authenticate against the platform session and re-verify store
/// ownership inside the service layer.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/auth", auth::platform_routes())
        .route("/auth/me", get(auth::current_owner))
        .nest("/customer", auth::customer_routes())
        .route("/customer/me", get(auth::current_customer))
        .nest("/cart", cart::routes())
        .nest(
            "/orders",
            orders::customer_routes()
                .merge(payments::routes())
                .merge(reviews::order_routes()),
        )
        .nest("/store/products", products::storefront_routes())
        .nest("/products", reviews::routes())
        .nest("/stores", products::owner_routes().merge(orders::owner_routes()))
}
