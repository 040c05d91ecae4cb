//! Daily and range aggregation.
//!
//! Totals are always re-derived from the meal and routine event tables.
//! Events are read in key order and summed before rounding, so recomputing
//! the same day twice yields identical records.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use fitledger_core::{
    ActivityCategory, ActivityMinutes, DailyTotals, DailyTrackingRecord, DateRange, DayTotals,
    Macros, RangeTotals, Result, RoutineItem, RoutineItemId, UserId,
};
use fitledger_store::Transaction;

use crate::Engine;

/// The aggregation engine of an [`Engine`].
#[derive(Clone, Copy)]
pub struct AggregationEngine<'e> {
    engine: &'e Engine,
}

impl<'e> AggregationEngine<'e> {
    pub(crate) const fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// Recompute a day from its events and upsert the cached record.
    ///
    /// Only the nutrition and workout/cardio columns are written; water,
    /// steps and sleep keep their stored values.
    ///
    /// # Errors
    ///
    /// Returns a storage error (nothing committed).
    pub fn recompute_day(&self, user_id: UserId, date: NaiveDate) -> Result<DailyTotals> {
        let mut tx = self.engine.begin()?;
        let totals = recompute_day_in(&mut tx, user_id, date)?;
        tx.commit()?;
        Ok(totals)
    }

    /// The cached record of a day, or an empty record if none was written.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn daily_record(&self, user_id: UserId, date: NaiveDate) -> Result<DailyTrackingRecord> {
        let mut tx = self.engine.begin()?;
        Ok(tx
            .tracking_record(user_id, date)?
            .unwrap_or_else(|| DailyTrackingRecord::empty(user_id, date)))
    }

    /// Totals over `start..=end` computed from events, not persisted.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` if `start > end` or the range is
    /// longer than the configured cap.
    pub fn range_totals(
        &self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeTotals> {
        let range = DateRange::new(start, end, self.engine.config().max_range_days)?;
        let mut tx = self.engine.begin()?;
        let sums = collect_days(&mut tx, user_id, range)?;

        let mut all_meals = Vec::new();
        let mut all_minutes = ActivityMinutes::default();
        let mut days = Vec::with_capacity(sums.len());
        for (date, day) in sums {
            all_meals.extend_from_slice(&day.meals);
            all_minutes.add(ActivityCategory::Workout, day.minutes.workout);
            all_minutes.add(ActivityCategory::Cardio, day.minutes.cardio);
            days.push(DayTotals {
                date,
                totals: day.totals(),
            });
        }

        Ok(RangeTotals {
            start: range.start(),
            end: range.end(),
            totals: DailyTotals::from_parts(Macros::sum(&all_meals), all_minutes),
            days,
        })
    }
}

/// Raw sums of one day, before rounding.
#[derive(Default)]
struct DaySums {
    meals: Vec<Macros>,
    minutes: ActivityMinutes,
}

impl DaySums {
    fn totals(&self) -> DailyTotals {
        DailyTotals::from_parts(Macros::sum(&self.meals), self.minutes)
    }
}

/// Group a user's events in `range` by day. Days without events are absent.
fn collect_days(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    range: DateRange,
) -> Result<BTreeMap<NaiveDate, DaySums>> {
    let mut days: BTreeMap<NaiveDate, DaySums> = BTreeMap::new();

    for meal in tx.meals_between(user_id, range.start(), range.end())? {
        days.entry(meal.date_consumed)
            .or_default()
            .meals
            .push(meal.consumed);
    }

    let logs = tx.routine_logs_between(user_id, range.start(), range.end())?;
    let mut items: HashMap<RoutineItemId, Option<RoutineItem>> = HashMap::new();
    for log in logs {
        let item = match items.get(&log.routine_item_id) {
            Some(item) => item.clone(),
            None => {
                let item = tx.routine_item(log.routine_item_id)?;
                items.insert(log.routine_item_id, item.clone());
                item
            }
        };
        let category = item.map_or_else(
            || ActivityCategory::classify("", None),
            |item| item.category(),
        );
        let minutes = log.effective_minutes(category);
        days.entry(log.date).or_default().minutes.add(category, minutes);
    }

    Ok(days)
}

/// Recompute and upsert one day inside an open transaction.
pub(crate) fn recompute_day_in(
    tx: &mut Transaction<'_>,
    user_id: UserId,
    date: NaiveDate,
) -> Result<DailyTotals> {
    let totals = collect_days(tx, user_id, DateRange::day(date))?
        .remove(&date)
        .map(|day| day.totals())
        .unwrap_or_default();

    let mut record = tx
        .tracking_record_for_update(user_id, date)?
        .unwrap_or_else(|| DailyTrackingRecord::empty(user_id, date));
    record.apply_totals(&totals);
    tx.put_tracking_record(&record)?;

    tracing::debug!(
        user_id = %user_id,
        date = %date,
        kcal = totals.kcal,
        workout_hours = totals.workout_hours,
        cardio_hours = totals.cardio_hours,
        "Daily totals recomputed"
    );
    Ok(totals)
}
