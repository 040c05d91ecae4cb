//! Fitledger HTTP API Service.
//!
//! This crate exposes the fitledger engine over HTTP:
//!
//! - Points ledger: award, revoke, balance, history, reconciliation
//! - Daily tracking: recompute and read day records, range reports
//! - Diary flows: meals and routine completions
//! - Weekly check-ins: availability, submission, autosave
//! - Admin authoring of check-ins, exercise metadata and memberships
//!
//! # Authentication
//!
//! The app backend calls `/v1` with a service API key in `x-api-key`.
//! Admin endpoints under `/v1/admin` take an admin key in `x-admin-key`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers call the synchronous engine

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
