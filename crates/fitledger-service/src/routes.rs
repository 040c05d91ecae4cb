//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, checkins, diary, health, points, tracking};
use crate::state::AppState;

/// Maximum concurrent requests for `/v1` endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for admin endpoints.
const ADMIN_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Points (Service API Key auth)
/// - `POST /v1/points/award` - Award points once per action, context and day
/// - `POST /v1/points/revoke` - Revoke an award
/// - `GET /v1/users/{user_id}/points` - Balance
/// - `GET /v1/users/{user_id}/points/history` - Ledger entries
/// - `POST /v1/users/{user_id}/points/reconcile` - Rebuild balance from ledger
///
/// ## Tracking (Service API Key auth)
/// - `POST /v1/users/{user_id}/tracking/{date}/recompute` - Recompute a day
/// - `GET /v1/users/{user_id}/tracking/{date}` - Cached day record
/// - `GET /v1/users/{user_id}/tracking?start=&end=` - Range totals
///
/// ## Diary (Service API Key auth)
/// - `POST /v1/diary/meals` - Log a meal
/// - `DELETE /v1/users/{user_id}/meals/{date}/{meal_id}` - Delete a meal
/// - `POST /v1/routines/complete` - Complete a routine item
/// - `POST /v1/routines/undo` - Undo a routine completion
///
/// ## Check-ins (Service API Key auth)
/// - `GET /v1/users/{user_id}/checkins/available` - Check-in to show
/// - `POST /v1/checkins/{config_id}/submit` - Submit answers
/// - `GET|PUT /v1/checkins/{config_id}/progress/{user_id}` - Autosave
/// - `GET /v1/checkins/{config_id}/status/{user_id}` - Week status
///
/// ## Admin (Admin API Key auth)
/// - `GET|PUT /v1/admin/checkins/{config_id}` - Check-in definitions
/// - `PUT /v1/admin/routine-items/{item_id}` - Exercise metadata
/// - `PUT /v1/admin/users/{user_id}/memberships` - Group memberships
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let admin_routes = Router::new()
        .route(
            "/checkins/:config_id",
            get(admin::get_checkin).put(admin::upsert_checkin),
        )
        .route("/routine-items/:item_id", put(admin::put_routine_item))
        .route(
            "/users/:user_id/memberships",
            put(admin::replace_memberships),
        )
        .layer(ConcurrencyLimitLayer::new(ADMIN_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Points
        .route("/points/award", post(points::award_points))
        .route("/points/revoke", post(points::revoke_points))
        .route("/users/:user_id/points", get(points::get_balance))
        .route("/users/:user_id/points/history", get(points::list_history))
        .route("/users/:user_id/points/reconcile", post(points::reconcile))
        // Tracking
        .route(
            "/users/:user_id/tracking/:date/recompute",
            post(tracking::recompute_day),
        )
        .route("/users/:user_id/tracking/:date", get(tracking::get_day))
        .route("/users/:user_id/tracking", get(tracking::get_range))
        // Diary
        .route("/diary/meals", post(diary::log_meal))
        .route(
            "/users/:user_id/meals/:date/:meal_id",
            delete(diary::delete_meal),
        )
        .route("/routines/complete", post(diary::complete_routine))
        .route("/routines/undo", post(diary::undo_routine))
        // Check-ins
        .route(
            "/users/:user_id/checkins/available",
            get(checkins::get_available),
        )
        .route("/checkins/:config_id/submit", post(checkins::submit))
        .route(
            "/checkins/:config_id/progress/:user_id",
            get(checkins::load_progress).put(checkins::save_progress),
        )
        .route(
            "/checkins/:config_id/status/:user_id",
            get(checkins::get_status),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS))
        .nest("/admin", admin_routes);

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
