//! Points ledger handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fitledger_core::{ActionKey, ContextId, PointsLedgerEntry, UserId};
use fitledger_engine::ledger::MAX_HISTORY_LIMIT;

use super::{parse_date, parse_id, parse_optional_date};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Award request.
#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    /// User receiving the points.
    pub user_id: i64,
    /// Action category, e.g. `ROUTINE_COMPLETE`.
    pub action_key: String,
    /// Disambiguating context, e.g. the routine item id.
    pub context_id: String,
    /// Points to grant.
    pub amount: i64,
    /// Day to attribute the award to (default: today).
    pub date: Option<String>,
}

/// Award response.
#[derive(Debug, Serialize)]
pub struct AwardResponse {
    /// Points granted by this request (0 if already awarded).
    pub points_awarded: i64,
    /// Balance after the request.
    pub new_total_points: i64,
    /// Whether the action had already been awarded for that day.
    pub already_awarded: bool,
}

/// Award points for an action, at most once per user, action, context and day.
pub async fn award_points(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<AwardRequest>,
) -> Result<Json<AwardResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        action_key = %body.action_key,
        context_id = %body.context_id,
        "Processing award"
    );

    let user_id: UserId = parse_id("user_id", body.user_id)?;
    let action_key = ActionKey::new(body.action_key)?;
    let context_id = ContextId::new(body.context_id)?;
    let date = parse_optional_date("date", body.date.as_deref())?;

    let outcome = state
        .engine
        .ledger()
        .award(user_id, action_key, context_id, body.amount, date)?;

    Ok(Json(AwardResponse {
        points_awarded: outcome.points_awarded,
        new_total_points: outcome.new_total_points,
        already_awarded: outcome.already_awarded(),
    }))
}

/// Revoke request.
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// User whose award is taken back.
    pub user_id: i64,
    /// Action category.
    pub action_key: String,
    /// Disambiguating context.
    pub context_id: String,
    /// Day the award was attributed to.
    pub date: String,
}

/// Revoke response.
#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    /// Points taken back (0 if nothing was awarded).
    pub points_revoked: i64,
    /// Balance after the request.
    pub new_total_points: i64,
}

/// Revoke the award for an action on a day.
pub async fn revoke_points(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<RevokeRequest>,
) -> Result<Json<RevokeResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        action_key = %body.action_key,
        "Processing revoke"
    );

    let user_id: UserId = parse_id("user_id", body.user_id)?;
    let action_key = ActionKey::new(body.action_key)?;
    let context_id = ContextId::new(body.context_id)?;
    let date = parse_date("date", &body.date)?;

    let outcome = state
        .engine
        .ledger()
        .revoke(user_id, action_key, context_id, date)?;

    Ok(Json(RevokeResponse {
        points_revoked: outcome.points_revoked,
        new_total_points: outcome.new_total_points,
    }))
}

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// The user.
    pub user_id: i64,
    /// Current balance.
    pub total_points: i64,
}

/// Get a user's points balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<i64>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let total_points = state.engine.ledger().balance(user)?;
    Ok(Json(BalanceResponse {
        user_id: user.get(),
        total_points,
    }))
}

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of entries to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Ledger entry response.
#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    /// Action category.
    pub action_key: String,
    /// Disambiguating context.
    pub context_id: String,
    /// Day the award is attributed to.
    pub date_awarded: String,
    /// Points granted.
    pub points_awarded: i64,
    /// When the award was written.
    pub awarded_at: String,
}

impl From<&PointsLedgerEntry> for LedgerEntryResponse {
    fn from(entry: &PointsLedgerEntry) -> Self {
        Self {
            action_key: entry.action_key.to_string(),
            context_id: entry.context_id.to_string(),
            date_awarded: entry.date_awarded.to_string(),
            points_awarded: entry.points_awarded,
            awarded_at: entry.awarded_at.to_rfc3339(),
        }
    }
}

/// History response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Entries (newest first).
    pub entries: Vec<LedgerEntryResponse>,
    /// Whether there are more entries.
    pub has_more: bool,
}

/// List a user's ledger entries.
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let limit = query.limit.clamp(1, MAX_HISTORY_LIMIT);
    let page = state.engine.ledger().history(user, limit, query.offset)?;

    Ok(Json(HistoryResponse {
        entries: page.entries.iter().map(LedgerEntryResponse::from).collect(),
        has_more: page.has_more,
    }))
}

/// Reconcile response.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    /// Balance before reconciliation.
    pub previous_balance: i64,
    /// Sum of ledger entries, now the balance.
    pub ledger_total: i64,
    /// Correction applied.
    pub drift: i64,
}

/// Recompute a user's balance from the ledger.
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Path(user_id): Path<i64>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let result = state.engine.ledger().reconcile(user)?;

    tracing::info!(
        service = %auth.service_name,
        user_id = %user,
        drift = result.drift(),
        "Balance reconciled"
    );

    Ok(Json(ReconcileResponse {
        previous_balance: result.previous_balance,
        ledger_total: result.ledger_total,
        drift: result.drift(),
    }))
}
