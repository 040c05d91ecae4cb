//! API handlers.
//!
//! Request bodies carry raw ids and dates; handlers parse them into core
//! types and reject malformed input with `400 bad_request` before touching
//! the engine.

pub mod admin;
pub mod checkins;
pub mod diary;
pub mod health;
pub mod points;
pub mod tracking;

use chrono::NaiveDate;

use fitledger_core::IdError;

use crate::error::ApiError;

/// Parse a positive integer id.
pub(crate) fn parse_id<T>(field: &str, raw: i64) -> Result<T, ApiError>
where
    T: TryFrom<i64, Error = IdError>,
{
    T::try_from(raw).map_err(|e| ApiError::BadRequest(format!("invalid {field}: {e}")))
}

/// Parse a `YYYY-MM-DD` date.
pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    fitledger_core::parse_date(raw).map_err(|e| ApiError::BadRequest(format!("invalid {field}: {e}")))
}

/// Parse an optional `YYYY-MM-DD` date.
pub(crate) fn parse_optional_date(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<NaiveDate>, ApiError> {
    raw.map(|raw| parse_date(field, raw)).transpose()
}
