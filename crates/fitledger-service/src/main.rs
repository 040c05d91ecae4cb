//! Fitledger Service - HTTP API for points, daily tracking and check-ins
//!
//! This is the main entry point for the fitledger service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fitledger_service::{create_router, AppState, ServiceConfig};
use fitledger_store::Store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fitledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fitledger Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();
    config.engine.validate()?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        utc_offset_minutes = config.engine.utc_offset_minutes,
        award_meal_points = config.engine.award_meal_points,
        award_checkin_points = config.engine.award_checkin_points,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;
    tracing::info!(backend = store.backend_name(), "Store ready");

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "rocksdb-backend")]
fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    Ok(Arc::new(fitledger_store::RocksStore::open(&config.data_dir)?))
}

#[cfg(not(feature = "rocksdb-backend"))]
fn open_store(_config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    tracing::warn!("Built without rocksdb-backend - using in-memory store, data is not persisted");
    Ok(Arc::new(fitledger_store::MemoryStore::new()))
}
