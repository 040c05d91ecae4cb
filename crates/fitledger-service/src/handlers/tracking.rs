//! Daily tracking handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fitledger_core::{DailyTotals, DailyTrackingRecord, RangeTotals, UserId};

use super::{parse_date, parse_id};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Recompute a day from its events and return the new totals.
pub async fn recompute_day(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((user_id, date)): Path<(i64, String)>,
) -> Result<Json<DailyTotals>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let date = parse_date("date", &date)?;
    let totals = state.engine.aggregation().recompute_day(user, date)?;
    Ok(Json(totals))
}

/// Get the cached record of a day.
pub async fn get_day(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((user_id, date)): Path<(i64, String)>,
) -> Result<Json<DailyTrackingRecord>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let date = parse_date("date", &date)?;
    let record = state.engine.aggregation().daily_record(user, date)?;
    Ok(Json(record))
}

/// Range query parameters.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// First day (inclusive).
    pub start: String,
    /// Last day (inclusive).
    pub end: String,
}

/// Range response.
#[derive(Debug, Serialize)]
pub struct RangeResponse {
    /// The report.
    #[serde(flatten)]
    pub report: RangeTotals,
    /// Number of days covered.
    pub day_count: i64,
}

/// Totals over a range of days, computed from events.
pub async fn get_range(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<i64>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<RangeResponse>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let start = parse_date("start", &query.start)?;
    let end = parse_date("end", &query.end)?;
    let report = state.engine.aggregation().range_totals(user, start, end)?;
    let day_count = (report.end - report.start).num_days() + 1;
    Ok(Json(RangeResponse { report, day_count }))
}
