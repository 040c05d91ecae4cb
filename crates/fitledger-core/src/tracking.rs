//! Daily tracking cache.
//!
//! A [`DailyTrackingRecord`] is derived data: the nutrition and
//! workout/cardio columns are re-derivable from the meal and routine event
//! tables. Water, steps and sleep are owned by other writers and survive a
//! recompute untouched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::activity::ActivityMinutes;
use crate::nutrition::{round2, Macros};
use crate::UserId;

/// Totals produced by the aggregation engine for one day or one range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    /// Energy in kcal.
    pub kcal: f64,
    /// Protein in grams.
    pub protein_g: f64,
    /// Carbohydrates in grams.
    pub carbs_g: f64,
    /// Fat in grams.
    pub fat_g: f64,
    /// Strength and crossfit time in hours.
    pub workout_hours: f64,
    /// Other exercise time in hours.
    pub cardio_hours: f64,
}

impl DailyTotals {
    /// Combine summed nutrition and activity minutes.
    #[must_use]
    pub fn from_parts(macros: Macros, activity: ActivityMinutes) -> Self {
        let macros = macros.rounded();
        Self {
            kcal: macros.kcal,
            protein_g: macros.protein_g,
            carbs_g: macros.carbs_g,
            fat_g: macros.fat_g,
            workout_hours: activity.workout_hours(),
            cardio_hours: activity.cardio_hours(),
        }
    }

    /// Component-wise sum, rounded to two decimals.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self {
            kcal: round2(self.kcal + other.kcal),
            protein_g: round2(self.protein_g + other.protein_g),
            carbs_g: round2(self.carbs_g + other.carbs_g),
            fat_g: round2(self.fat_g + other.fat_g),
            workout_hours: round2(self.workout_hours + other.workout_hours),
            cardio_hours: round2(self.cardio_hours + other.cardio_hours),
        }
    }

    /// Whether every component is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Cached per-day dashboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrackingRecord {
    /// Owner.
    pub user_id: UserId,
    /// Day.
    pub date: NaiveDate,
    /// Energy in kcal.
    pub kcal_consumed: f64,
    /// Protein in grams.
    pub protein_consumed_g: f64,
    /// Carbohydrates in grams.
    pub carbs_consumed_g: f64,
    /// Fat in grams.
    pub fat_consumed_g: f64,
    /// Cups of water.
    pub water_cups: u32,
    /// Step count.
    pub steps: u32,
    /// Hours slept.
    pub sleep_hours: f64,
    /// Strength and crossfit time in hours.
    pub workout_hours: f64,
    /// Other exercise time in hours.
    pub cardio_hours: f64,
}

impl DailyTrackingRecord {
    /// An empty record.
    #[must_use]
    pub const fn empty(user_id: UserId, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            kcal_consumed: 0.0,
            protein_consumed_g: 0.0,
            carbs_consumed_g: 0.0,
            fat_consumed_g: 0.0,
            water_cups: 0,
            steps: 0,
            sleep_hours: 0.0,
            workout_hours: 0.0,
            cardio_hours: 0.0,
        }
    }

    /// Overwrite the columns owned by the aggregation engine.
    pub fn apply_totals(&mut self, totals: &DailyTotals) {
        self.kcal_consumed = totals.kcal;
        self.protein_consumed_g = totals.protein_g;
        self.carbs_consumed_g = totals.carbs_g;
        self.fat_consumed_g = totals.fat_g;
        self.workout_hours = totals.workout_hours;
        self.cardio_hours = totals.cardio_hours;
    }

    /// The aggregation-owned columns.
    #[must_use]
    pub const fn totals(&self) -> DailyTotals {
        DailyTotals {
            kcal: self.kcal_consumed,
            protein_g: self.protein_consumed_g,
            carbs_g: self.carbs_consumed_g,
            fat_g: self.fat_consumed_g,
            workout_hours: self.workout_hours,
            cardio_hours: self.cardio_hours,
        }
    }
}

/// Totals of one day inside a range report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayTotals {
    /// The day.
    pub date: NaiveDate,
    /// Its totals.
    #[serde(flatten)]
    pub totals: DailyTotals,
}

/// Range report computed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTotals {
    /// First day (inclusive).
    pub start: NaiveDate,
    /// Last day (inclusive).
    pub end: NaiveDate,
    /// Sum over the range.
    pub totals: DailyTotals,
    /// Days with at least one event, ascending.
    pub days: Vec<DayTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityCategory;

    #[test]
    fn apply_totals_keeps_foreign_columns() {
        let user = UserId::new(3).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut record = DailyTrackingRecord::empty(user, date);
        record.water_cups = 6;
        record.steps = 8000;
        record.sleep_hours = 7.5;

        let mut minutes = ActivityMinutes::default();
        minutes.add(ActivityCategory::Workout, 45);
        let totals = DailyTotals::from_parts(
            Macros {
                kcal: 1800.0,
                protein_g: 120.0,
                carbs_g: 200.0,
                fat_g: 60.0,
            },
            minutes,
        );
        record.apply_totals(&totals);

        assert_eq!(record.water_cups, 6);
        assert_eq!(record.steps, 8000);
        assert!((record.sleep_hours - 7.5).abs() < f64::EPSILON);
        assert_eq!(record.totals(), totals);
        assert!((record.workout_hours - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn plus_adds_components() {
        let a = DailyTotals {
            kcal: 100.0,
            cardio_hours: 0.5,
            ..DailyTotals::default()
        };
        let b = DailyTotals {
            kcal: 50.5,
            workout_hours: 1.0,
            ..DailyTotals::default()
        };
        let sum = a.plus(b);
        assert!((sum.kcal - 150.5).abs() < f64::EPSILON);
        assert!((sum.workout_hours - 1.0).abs() < f64::EPSILON);
        assert!(!sum.is_empty());
        assert!(DailyTotals::default().is_empty());
    }
}
