//! Admin handlers for check-in authoring, exercise metadata and group
//! memberships.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fitledger_core::{
    ActivityCategory, CheckinConfig, CheckinConfigId, CheckinQuestion, DayOfWeek,
    DistributionTarget, GroupId, GroupKind, QuestionKind, RoutineItem, RoutineItemId, UserId,
};
use fitledger_engine::CheckinDefinition;

use super::{parse_id, parse_optional_date};
use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Question in request format.
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    /// Question id.
    pub id: i64,
    /// Display order.
    pub position: u32,
    /// Question text.
    pub prompt: String,
    /// "text" (default) or "scale".
    pub kind: Option<String>,
}

/// Distribution row as authored (`target_type`, `target_id`).
#[derive(Debug, Deserialize, Serialize)]
pub struct DistributionRow {
    /// "user", "group" or "challenge_group".
    pub target_type: String,
    /// Target id; negative group ids denote challenge groups.
    pub target_id: i64,
}

/// Check-in upsert request.
#[derive(Debug, Deserialize)]
pub struct CheckinRequest {
    /// Display name.
    pub name: String,
    /// Weekday the check-in opens, 0 = Sunday.
    pub day_of_week: u8,
    /// Whether the check-in is live (default: true).
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// First date an instance may open (default: kept, or today for a new
    /// check-in).
    pub starts_on: Option<String>,
    /// Questions.
    #[serde(default)]
    pub questions: Vec<QuestionRequest>,
    /// Allow-list; empty means every user.
    #[serde(default)]
    pub distributions: Vec<DistributionRow>,
}

fn default_active() -> bool {
    true
}

fn parse_kind(raw: Option<&str>) -> Result<QuestionKind, ApiError> {
    match raw.map(|kind| kind.trim().to_ascii_lowercase()).as_deref() {
        None | Some("text") => Ok(QuestionKind::Text),
        Some("scale") => Ok(QuestionKind::Scale),
        Some(other) => Err(ApiError::BadRequest(format!(
            "unknown question kind: {other}"
        ))),
    }
}

/// Check-in definition response.
#[derive(Debug, Serialize)]
pub struct CheckinResponse {
    /// Config id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Weekday the check-in opens, 0 = Sunday.
    pub day_of_week: u8,
    /// Whether the check-in is live.
    pub is_active: bool,
    /// First date an instance may open.
    pub starts_on: Option<String>,
    /// Number of questions.
    pub question_count: usize,
    /// Allow-list rows.
    pub distributions: Vec<DistributionRow>,
}

impl From<&CheckinDefinition> for CheckinResponse {
    fn from(definition: &CheckinDefinition) -> Self {
        Self {
            id: definition.config.id.get(),
            name: definition.config.name.clone(),
            day_of_week: definition.config.day_of_week.into(),
            is_active: definition.config.is_active,
            starts_on: definition.config.starts_on.map(|date| date.to_string()),
            question_count: definition.questions.len(),
            distributions: definition
                .distributions
                .iter()
                .map(|target| {
                    let (target_type, target_id) = target.to_raw();
                    DistributionRow {
                        target_type: target_type.to_string(),
                        target_id,
                    }
                })
                .collect(),
        }
    }
}

/// Create or replace a check-in with its questions and allow-list.
pub async fn upsert_checkin(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(config_id): Path<i64>,
    Json(body): Json<CheckinRequest>,
) -> Result<Json<CheckinResponse>, ApiError> {
    let id: CheckinConfigId = parse_id("config_id", config_id)?;
    let config = CheckinConfig {
        id,
        name: body.name,
        day_of_week: DayOfWeek::new(body.day_of_week)?,
        is_active: body.is_active,
        starts_on: parse_optional_date("starts_on", body.starts_on.as_deref())?,
    };
    let questions = body
        .questions
        .into_iter()
        .map(|q| {
            Ok(CheckinQuestion {
                id: parse_id("question id", q.id)?,
                config_id: id,
                position: q.position,
                prompt: q.prompt,
                kind: parse_kind(q.kind.as_deref())?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;
    let distributions = body
        .distributions
        .iter()
        .map(|row| DistributionTarget::from_raw(&row.target_type, row.target_id))
        .collect::<fitledger_core::Result<Vec<_>>>()?;

    let definition = CheckinDefinition {
        config,
        questions,
        distributions,
    };
    let stored = state.engine.admin().upsert_checkin(&definition)?;

    tracing::info!(admin_id = %auth.admin_id, config_id = %id, "Check-in upserted");

    Ok(Json(CheckinResponse::from(&stored)))
}

/// Get a check-in definition.
pub async fn get_checkin(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(config_id): Path<i64>,
) -> Result<Json<CheckinResponse>, ApiError> {
    let id: CheckinConfigId = parse_id("config_id", config_id)?;
    let definition = state.engine.admin().checkin(id)?;
    Ok(Json(CheckinResponse::from(&definition)))
}

/// Exercise metadata request.
#[derive(Debug, Deserialize)]
pub struct RoutineItemRequest {
    /// Exercise display name.
    pub exercise_name: String,
    /// Optional exercise type tag.
    pub exercise_type: Option<String>,
}

/// Exercise metadata response.
#[derive(Debug, Serialize)]
pub struct RoutineItemResponse {
    /// Routine item id.
    pub id: i64,
    /// Bucket the exercise counts towards.
    pub category: ActivityCategory,
}

/// Create or replace exercise metadata.
pub async fn put_routine_item(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(item_id): Path<i64>,
    Json(body): Json<RoutineItemRequest>,
) -> Result<Json<RoutineItemResponse>, ApiError> {
    let id: RoutineItemId = parse_id("item_id", item_id)?;
    let item = RoutineItem {
        id,
        exercise_name: body.exercise_name,
        exercise_type: body.exercise_type.filter(|t| !t.trim().is_empty()),
    };
    state.engine.admin().put_routine_item(&item)?;

    tracing::debug!(admin_id = %auth.admin_id, routine_item_id = %id, "Routine item upserted");

    Ok(Json(RoutineItemResponse {
        id: id.get(),
        category: item.category(),
    }))
}

/// One membership in request format.
#[derive(Debug, Deserialize)]
pub struct MembershipRow {
    /// "group" or "challenge_group".
    pub kind: String,
    /// Group id.
    pub group_id: i64,
}

/// Membership replacement request.
#[derive(Debug, Deserialize)]
pub struct MembershipsRequest {
    /// The user's complete membership list.
    pub memberships: Vec<MembershipRow>,
}

/// Membership replacement response.
#[derive(Debug, Serialize)]
pub struct MembershipsResponse {
    /// The user.
    pub user_id: i64,
    /// Number of memberships stored.
    pub count: usize,
}

/// Replace a user's group and challenge-group memberships.
pub async fn replace_memberships(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(user_id): Path<i64>,
    Json(body): Json<MembershipsRequest>,
) -> Result<Json<MembershipsResponse>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let memberships = body
        .memberships
        .iter()
        .map(|row| {
            let kind = match row.kind.trim().to_ascii_lowercase().as_str() {
                "group" => GroupKind::Group,
                "challenge_group" => GroupKind::ChallengeGroup,
                other => {
                    return Err(ApiError::BadRequest(format!(
                        "unknown membership kind: {other}"
                    )))
                }
            };
            let group: GroupId = parse_id("group_id", row.group_id)?;
            Ok((kind, group))
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    state.engine.admin().replace_memberships(user, &memberships)?;

    tracing::info!(
        admin_id = %auth.admin_id,
        user_id = %user,
        count = memberships.len(),
        "Memberships replaced"
    );

    Ok(Json(MembershipsResponse {
        user_id: user.get(),
        count: memberships.len(),
    }))
}
