//! Meal diary and routine handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fitledger_core::{
    AwardOutcome, DailyTotals, Macros, MealLogId, MealSource, MealType, RecipeId, RoutineItemId,
    UserId,
};
use fitledger_engine::NewMeal;

use super::{parse_date, parse_id, parse_optional_date};
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Meal log request.
///
/// Exactly one of `recipe_id` and `custom_name` must be set.
#[derive(Debug, Deserialize)]
pub struct MealRequest {
    /// Owner.
    pub user_id: i64,
    /// Catalog recipe eaten.
    pub recipe_id: Option<i64>,
    /// Free-text item eaten.
    pub custom_name: Option<String>,
    /// Meal slot, e.g. "lunch".
    pub meal_type: String,
    /// Day the meal counts towards.
    pub date_consumed: String,
    /// Number of servings (default: 1).
    #[serde(default = "default_servings")]
    pub servings: f64,
    /// Energy consumed in kcal.
    pub kcal: f64,
    /// Protein consumed in grams.
    #[serde(default)]
    pub protein_g: f64,
    /// Carbohydrates consumed in grams.
    #[serde(default)]
    pub carbs_g: f64,
    /// Fat consumed in grams.
    #[serde(default)]
    pub fat_g: f64,
}

fn default_servings() -> f64 {
    1.0
}

/// Meal log response.
#[derive(Debug, Serialize)]
pub struct MealResponse {
    /// Id of the stored meal.
    pub meal_id: String,
    /// Recomputed totals of the day.
    pub totals: DailyTotals,
    /// Points outcome, absent when meal points are disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub award: Option<AwardOutcome>,
}

/// Log a meal.
pub async fn log_meal(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<MealRequest>,
) -> Result<Json<MealResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        meal_type = %body.meal_type,
        "Processing meal log"
    );

    let user_id: UserId = parse_id("user_id", body.user_id)?;
    let source = match (body.recipe_id, body.custom_name) {
        (Some(recipe), None) => MealSource::Recipe(parse_id::<RecipeId>("recipe_id", recipe)?),
        (None, Some(name)) => MealSource::Custom(name),
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of recipe_id and custom_name is required".into(),
            ))
        }
    };
    let meal_type: MealType = body.meal_type.parse()?;
    let date_consumed = parse_date("date_consumed", &body.date_consumed)?;

    let logged = state.engine.diary().log_meal(NewMeal {
        user_id,
        source,
        meal_type,
        date_consumed,
        servings: body.servings,
        consumed: Macros {
            kcal: body.kcal,
            protein_g: body.protein_g,
            carbs_g: body.carbs_g,
            fat_g: body.fat_g,
        },
    })?;

    Ok(Json(MealResponse {
        meal_id: logged.meal.id.to_string(),
        totals: logged.totals,
        award: logged.award,
    }))
}

/// Delete a meal and return the recomputed totals of its day.
pub async fn delete_meal(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path((user_id, date, meal_id)): Path<(i64, String, String)>,
) -> Result<Json<DailyTotals>, ApiError> {
    let user: UserId = parse_id("user_id", user_id)?;
    let date = parse_date("date", &date)?;
    let meal_id: MealLogId = meal_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid meal_id".into()))?;

    let totals = state.engine.diary().delete_meal(user, date, meal_id)?;
    Ok(Json(totals))
}

/// Routine completion request.
#[derive(Debug, Deserialize)]
pub struct CompleteRoutineRequest {
    /// Owner.
    pub user_id: i64,
    /// Routine item completed.
    pub routine_item_id: i64,
    /// Day of the completion (default: today).
    pub date: Option<String>,
    /// Exercise duration in minutes, if recorded.
    pub exercise_duration_minutes: Option<u32>,
}

/// Routine completion response.
#[derive(Debug, Serialize)]
pub struct CompleteRoutineResponse {
    /// Points granted (0 if already completed that day).
    pub points_awarded: i64,
    /// Balance after the request.
    pub new_total_points: i64,
    /// Recomputed totals of the day.
    pub totals: DailyTotals,
}

/// Complete a routine item.
pub async fn complete_routine(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<CompleteRoutineRequest>,
) -> Result<Json<CompleteRoutineResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        routine_item_id = %body.routine_item_id,
        "Processing routine completion"
    );

    let user_id: UserId = parse_id("user_id", body.user_id)?;
    let item_id: RoutineItemId = parse_id("routine_item_id", body.routine_item_id)?;
    let date = parse_optional_date("date", body.date.as_deref())?;

    let completed = state.engine.diary().complete_routine_item(
        user_id,
        item_id,
        date,
        body.exercise_duration_minutes,
    )?;

    Ok(Json(CompleteRoutineResponse {
        points_awarded: completed.award.points_awarded,
        new_total_points: completed.award.new_total_points,
        totals: completed.totals,
    }))
}

/// Routine undo request.
#[derive(Debug, Deserialize)]
pub struct UndoRoutineRequest {
    /// Owner.
    pub user_id: i64,
    /// Routine item to undo.
    pub routine_item_id: i64,
    /// Day of the completion.
    pub date: String,
}

/// Routine undo response.
#[derive(Debug, Serialize)]
pub struct UndoRoutineResponse {
    /// Points taken back (0 if nothing was awarded).
    pub points_revoked: i64,
    /// Balance after the request.
    pub new_total_points: i64,
    /// Recomputed totals of the day.
    pub totals: DailyTotals,
}

/// Undo a routine completion.
pub async fn undo_routine(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<UndoRoutineRequest>,
) -> Result<Json<UndoRoutineResponse>, ApiError> {
    let user_id: UserId = parse_id("user_id", body.user_id)?;
    let item_id: RoutineItemId = parse_id("routine_item_id", body.routine_item_id)?;
    let date = parse_date("date", &body.date)?;

    let undone = state
        .engine
        .diary()
        .undo_routine_item(user_id, item_id, date)?;

    Ok(Json(UndoRoutineResponse {
        points_revoked: undone.revoke.points_revoked,
        new_total_points: undone.revoke.new_total_points,
        totals: undone.totals,
    }))
}
