pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;
pub mod tenant;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::SessionService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{CartService, CatalogService, OrderService, PaymentService, ReviewService};
use crate::tenant::TenantResolver;

/// Service instances shared by every request.
#[derive(Clone)]
pub struct AppServices {
    pub carts: CartService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub reviews: ReviewService,
    pub catalog: CatalogService,
    pub sessions: SessionService,
    pub tenants: TenantResolver,
}

/// Shared application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, event_sender: EventSender) -> Self {
        let db = Arc::new(db);
        let event_sender = Arc::new(event_sender);
        let services = AppServices {
            carts: CartService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(
                db.clone(),
                event_sender.clone(),
                config.enforce_status_order,
            ),
            payments: PaymentService::new(db.clone(), event_sender.clone()),
            reviews: ReviewService::new(db.clone(), event_sender.clone()),
            catalog: CatalogService::new(db.clone()),
            sessions: SessionService::new(
                db.clone(),
                event_sender.clone(),
                config.session_ttl_secs,
            ),
            tenants: TenantResolver::new(db.clone()),
        };
        Self {
            db,
            config: Arc::new(config),
            event_sender,
            services,
        }
    }
}

/// Builds the full application router with tracing, CORS, and a request
/// timeout applied to every route.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", handlers::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    db::check_connection(&state.db).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
