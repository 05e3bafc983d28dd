#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::{
    app,
    auth::SessionScope,
    config::AppConfig,
    db,
    entities::{self, ProductModel, StoreModel, UserModel},
    events::{process_events, EventSender},
    services::catalog::ProductInput,
    AppState,
};

/// Test harness backed by a throwaway SQLite database.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config).await
    }

    /// Variant allowing a test to tweak the config before startup.
    pub async fn with_config<F>(make_config: F) -> Self
    where
        F: FnOnce(&str) -> AppConfig,
    {
        let db_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = db_dir.path().join("storefront_test.db");
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let cfg = make_config(&database_url);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");

        let (tx, rx) = mpsc::channel(256);
        let event_task = tokio::spawn(process_events(rx));

        let state = Arc::new(AppState::new(pool, cfg, EventSender::new(tx)));
        let router = app(state.clone());

        Self {
            state,
            router,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Registers a platform account (a store owner).
    pub async fn seed_owner(&self, email: &str) -> UserModel {
        self.state
            .services
            .sessions
            .register(email, "password123", "Owner", None, SessionScope::Platform)
            .await
            .expect("failed to seed owner")
    }

    /// Registers a customer account scoped to one store.
    pub async fn seed_customer(&self, email: &str, store_id: Uuid) -> UserModel {
        self.state
            .services
            .sessions
            .register(
                email,
                "password123",
                "Customer",
                Some("Test"),
                SessionScope::Customer { store_id },
            )
            .await
            .expect("failed to seed customer")
    }

    pub async fn seed_store(&self, owner_id: Uuid, name: &str) -> StoreModel {
        self.state
            .services
            .catalog
            .create_store(owner_id, name, "test store")
            .await
            .expect("failed to seed store")
    }

    pub async fn seed_product(
        &self,
        owner_id: Uuid,
        store_id: Uuid,
        name: &str,
        price: Decimal,
        quantity: i32,
    ) -> ProductModel {
        self.state
            .services
            .catalog
            .create_product(
                owner_id,
                store_id,
                ProductInput {
                    name: name.to_string(),
                    description: String::new(),
                    price,
                    quantity,
                    image: String::new(),
                },
            )
            .await
            .expect("failed to seed product")
    }

    /// Current available stock for a product.
    pub async fn product_quantity(&self, product_id: Uuid) -> i32 {
        entities::Product::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("product query failed")
            .expect("product missing")
            .quantity
    }

    /// Number of cart lines currently held by a user.
    pub async fn cart_line_count(&self, user_id: Uuid) -> usize {
        use sea_orm::{ColumnTrait, QueryFilter};
        entities::CartItem::find()
            .filter(entities::cart_item::Column::UserId.eq(user_id))
            .all(&*self.state.db)
            .await
            .expect("cart query failed")
            .len()
    }
}

/// Default test configuration against the given database.
pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: false,
        session_ttl_secs: 3600,
        enforce_status_order: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
    }
}
