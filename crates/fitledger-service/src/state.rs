//! Application state.

use std::sync::Arc;

use fitledger_engine::Engine;
use fitledger_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The engine over the configured store.
    pub engine: Engine,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not set - all /v1 requests will be rejected");
        }
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not set - admin endpoints are disabled");
        }

        let engine = Engine::new(store, config.engine.clone());
        Self { engine, config }
    }

    /// Create a state around an existing engine (custom clock, tests).
    #[must_use]
    pub fn with_engine(engine: Engine, config: ServiceConfig) -> Self {
        Self { engine, config }
    }
}
