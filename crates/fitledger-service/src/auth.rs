//! Authentication extractors.
//!
//! - `ServiceAuth` - Backend-to-service authentication via API key
//! - `AdminAuth` - Admin authentication for check-in authoring and metadata

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::crypto::api_key_matches;
use crate::error::ApiError;
use crate::state::AppState;

/// Service authentication via API key.
///
/// Used for every `/v1` request from the app backend.
#[derive(Debug, Clone)]
pub struct ServiceAuth {
    /// The service name or identifier.
    pub service_name: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = header(parts, "x-api-key").ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .service_api_key
            .as_deref()
            .ok_or(ApiError::Unauthorized)?;

        if !api_key_matches(api_key, expected_key) {
            tracing::debug!("Rejected service request with wrong API key");
            return Err(ApiError::Unauthorized);
        }

        let service_name = header(parts, "x-service-name")
            .unwrap_or("unknown")
            .to_string();

        Ok(ServiceAuth { service_name })
    }
}

/// Admin authentication via API key with admin scope.
///
/// Requires the `X-Admin-Key` header to match the configured admin key.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = header(parts, "x-admin-key").ok_or(ApiError::Unauthorized)?;

        let expected_key = state
            .config
            .admin_api_key
            .as_deref()
            .ok_or(ApiError::Unauthorized)?;

        if !api_key_matches(admin_key, expected_key) {
            return Err(ApiError::Unauthorized);
        }

        let admin_id = header(parts, "x-admin-id").unwrap_or("admin").to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

fn header<'p>(parts: &'p Parts, name: &str) -> Option<&'p str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}
