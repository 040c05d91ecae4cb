//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use fitledger_core::EngineError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - the resource is not in a state that accepts the request.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage temporarily unavailable; nothing was committed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::StorageUnavailable(msg) => {
                tracing::warn!(error = %msg, "Storage unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_unavailable",
                    "Nothing happened, try again".to_string(),
                    Some(serde_json::json!({ "retryable": true })),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput(_) | EngineError::InvalidId(_) | EngineError::InvalidDate(_) => {
                Self::BadRequest(err.to_string())
            }
            EngineError::NotFound { .. } => Self::NotFound(err.to_string()),
            EngineError::CheckinInactive { .. } | EngineError::CheckinNotOpen { .. } => {
                Self::Conflict(err.to_string())
            }
            EngineError::Storage(msg) => Self::StorageUnavailable(msg),
            EngineError::Serialization(msg) | EngineError::Integrity(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_status() {
        let cases = [
            (EngineError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::InvalidDate("x".into()), StatusCode::BAD_REQUEST),
            (
                EngineError::NotFound {
                    entity: "meal",
                    id: "1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::CheckinInactive {
                    config_id: "1".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::CheckinNotOpen {
                    config_id: "1".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                EngineError::Storage("busy".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                EngineError::Serialization("bad".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                EngineError::Integrity("ledger index points at a missing entry".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
