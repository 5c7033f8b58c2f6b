//! # Meridian Server
//!
//! HTTP API over the settlement engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Meridian Server                                  │
//! │                                                                         │
//! │  Register UI ───► REST (8000) ───► Engine Services ───► SQLite          │
//! │                                         │                               │
//! │                                         ▼                               │
//! │                                   Card Gateway                          │
//! │                                  (HTTPS intents)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::state::AppState;
use meridian_db::{Database, DbConfig};
use meridian_engine::{GatewayConfig, HttpPaymentGateway, PaymentGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meridian=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Meridian POS server...");

    // Load configuration
    let config = ServerConfig::load()?;
    info!(
        bind = %config.bind_addr,
        db = %config.database_path,
        gateway = %config.gateway_url,
        currency = %config.currency,
        "Configuration loaded"
    );

    // Open the database and run migrations
    let db_config = DbConfig::new(config.database_path.clone())
        .max_connections(config.db_max_connections);
    let db = Arc::new(Database::new(db_config).await?);
    info!("Database ready");

    // Build the card gateway client
    let gateway_config = GatewayConfig::new(
        config.gateway_url.clone(),
        config.gateway_secret_key.clone(),
    )
    .with_timeout(config.gateway_timeout);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(gateway_config)?);

    // Wire shared state and routes
    let state = Arc::new(AppState::new(
        Arc::clone(&db),
        gateway,
        config.currency.clone(),
    ));
    let app = routes::router(state);

    // Bind and serve
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
