//! Meal and routine flows.
//!
//! Each flow writes the event, settles points and recomputes the day inside
//! one transaction. Locks are taken in the order ledger, balance, tracking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use fitledger_core::{
    ActionKey, AwardOutcome, ContextId, DailyTotals, EngineError, LedgerKey, Macros, MealLogEvent,
    MealLogId, MealSource, MealType, Result, RevokeOutcome, RoutineItemId, RoutineLogEvent,
    UserId,
};

use crate::aggregation::recompute_day_in;
use crate::ledger::{award_in, revoke_in};
use crate::Engine;

/// A meal to log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeal {
    /// Owner.
    pub user_id: UserId,
    /// What was eaten.
    pub source: MealSource,
    /// Meal slot.
    pub meal_type: MealType,
    /// Day the meal counts towards.
    pub date_consumed: NaiveDate,
    /// Number of servings.
    pub servings: f64,
    /// Nutrition consumed.
    pub consumed: Macros,
}

/// Result of [`Diary::log_meal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLogged {
    /// The stored row.
    pub meal: MealLogEvent,
    /// Recomputed totals of the day.
    pub totals: DailyTotals,
    /// Points outcome, if meal points are enabled.
    pub award: Option<AwardOutcome>,
}

/// Result of [`Diary::complete_routine_item`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutineCompleted {
    /// Points outcome.
    pub award: AwardOutcome,
    /// Recomputed totals of the day.
    pub totals: DailyTotals,
}

/// Result of [`Diary::undo_routine_item`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutineUndone {
    /// Points outcome.
    pub revoke: RevokeOutcome,
    /// Recomputed totals of the day.
    pub totals: DailyTotals,
}

/// Diary flows of an [`Engine`].
#[derive(Clone, Copy)]
pub struct Diary<'e> {
    engine: &'e Engine,
}

impl<'e> Diary<'e> {
    pub(crate) const fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// Log a meal, award `MEAL_LOGGED_{TYPE}` for its day and recompute it.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for invalid servings or macros, or
    /// a storage error (nothing committed).
    pub fn log_meal(&self, meal: NewMeal) -> Result<MealLogged> {
        let now = self.engine.now();
        let event = MealLogEvent {
            id: MealLogId::generate(),
            user_id: meal.user_id,
            source: meal.source,
            meal_type: meal.meal_type,
            date_consumed: meal.date_consumed,
            servings: meal.servings,
            consumed: meal.consumed,
            logged_at: now,
        };
        event.validate()?;

        let config = self.engine.config();
        let mut tx = self.engine.begin()?;
        tx.put_meal(&event)?;
        let award = if config.award_meal_points {
            let key = LedgerKey::new(
                event.user_id,
                ActionKey::meal_logged(event.meal_type),
                ContextId::meal(event.meal_type),
                event.date_consumed,
            );
            Some(award_in(&mut tx, key, config.points_meal_logged, now)?)
        } else {
            None
        };
        let totals = recompute_day_in(&mut tx, event.user_id, event.date_consumed)?;
        tx.commit()?;

        tracing::info!(
            user_id = %event.user_id,
            meal_id = %event.id,
            meal_type = event.meal_type.as_str(),
            date = %event.date_consumed,
            "Meal logged"
        );
        Ok(MealLogged {
            meal: event,
            totals,
            award,
        })
    }

    /// Delete a meal and recompute its day. Points stay awarded.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the meal does not exist, or a
    /// storage error (nothing committed).
    pub fn delete_meal(
        &self,
        user_id: UserId,
        date: NaiveDate,
        meal_id: MealLogId,
    ) -> Result<DailyTotals> {
        let mut tx = self.engine.begin()?;
        if tx.meal(user_id, date, meal_id)?.is_none() {
            return Err(EngineError::NotFound {
                entity: "meal",
                id: meal_id.to_string(),
            });
        }
        tx.delete_meal(user_id, date, meal_id)?;
        let totals = recompute_day_in(&mut tx, user_id, date)?;
        tx.commit()?;

        tracing::info!(user_id = %user_id, meal_id = %meal_id, date = %date, "Meal deleted");
        Ok(totals)
    }

    /// Record a routine item as done, award `ROUTINE_COMPLETE` and recompute.
    ///
    /// `date` defaults to today. An existing completion for the same item and
    /// day is kept as it is.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for an out-of-range duration, or
    /// a storage error (nothing committed).
    pub fn complete_routine_item(
        &self,
        user_id: UserId,
        item_id: RoutineItemId,
        date: Option<NaiveDate>,
        duration_minutes: Option<u32>,
    ) -> Result<RoutineCompleted> {
        let now = self.engine.now();
        let date = date.unwrap_or_else(|| self.engine.today_at(now));
        let candidate = RoutineLogEvent {
            user_id,
            routine_item_id: item_id,
            date,
            is_completed: true,
            exercise_duration_minutes: duration_minutes,
            logged_at: now,
        };
        candidate.validate()?;

        let key = LedgerKey::new(
            user_id,
            ActionKey::routine_complete(),
            ContextId::routine_item(item_id),
            date,
        );
        let mut tx = self.engine.begin()?;
        let award = award_in(
            &mut tx,
            key,
            self.engine.config().points_routine_complete,
            now,
        )?;
        match tx.routine_log_for_update(user_id, date, item_id)? {
            Some(existing) if existing.is_completed => {
                tracing::debug!(
                    user_id = %user_id,
                    routine_item_id = %item_id,
                    date = %date,
                    "Routine item already completed"
                );
            }
            Some(existing) => {
                let log = RoutineLogEvent {
                    exercise_duration_minutes: duration_minutes
                        .or(existing.exercise_duration_minutes),
                    ..candidate
                };
                tx.put_routine_log(&log)?;
            }
            None => tx.put_routine_log(&candidate)?,
        }
        let totals = recompute_day_in(&mut tx, user_id, date)?;
        tx.commit()?;

        Ok(RoutineCompleted { award, totals })
    }

    /// Remove a routine completion, revoke its award and recompute.
    ///
    /// # Errors
    ///
    /// Returns a storage error (nothing committed).
    pub fn undo_routine_item(
        &self,
        user_id: UserId,
        item_id: RoutineItemId,
        date: NaiveDate,
    ) -> Result<RoutineUndone> {
        let now = self.engine.now();
        let key = LedgerKey::new(
            user_id,
            ActionKey::routine_complete(),
            ContextId::routine_item(item_id),
            date,
        );
        let mut tx = self.engine.begin()?;
        let revoke = revoke_in(&mut tx, &key, now)?;
        if tx.routine_log_for_update(user_id, date, item_id)?.is_some() {
            tx.delete_routine_log(user_id, date, item_id)?;
        }
        let totals = recompute_day_in(&mut tx, user_id, date)?;
        tx.commit()?;

        Ok(RoutineUndone { revoke, totals })
    }
}
