use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use storefront_api::config::load_config;
use storefront_api::db::{establish_connection_from_app_config, run_migrations};
use storefront_api::events::{process_events, EventSender};
use storefront_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    if config.log_json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let db = establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;

    if config.auto_migrate {
        run_migrations(&db).await.context("migrations failed")?;
    }

    let (tx, rx) = mpsc::channel(1024);
    tokio::spawn(process_events(rx));

    let addr = config.server_addr();
    let state = Arc::new(AppState::new(db, config, EventSender::new(tx)));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app(state))
        .await
        .context("server error")?;

    Ok(())
}
