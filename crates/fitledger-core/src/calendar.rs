//! Calendar helpers: week anchors and check-in days.
//!
//! Weeks run Sunday to Saturday. The Sunday that starts a week (the *week
//! anchor*) identifies which weekly check-in instance a row belongs to.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Return the Sunday on or before `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_sunday();
    date - Days::new(u64::from(offset))
}

/// Parse a `YYYY-MM-DD` calendar date.
///
/// # Errors
///
/// Returns `EngineError::InvalidDate` if the input is not a valid date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| EngineError::InvalidDate(input.to_string()))
}

/// A weekday in check-in numbering: 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    /// Sunday.
    pub const SUNDAY: Self = Self(0);
    /// Thursday.
    pub const THURSDAY: Self = Self(4);

    /// Create a weekday from its 0..=6 number.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for values above 6.
    pub fn new(day: u8) -> Result<Self> {
        if day > 6 {
            return Err(EngineError::InvalidInput(format!(
                "day_of_week must be 0..=6, got {day}"
            )));
        }
        Ok(Self(day))
    }

    /// Days after the week anchor.
    #[must_use]
    pub const fn offset(self) -> u8 {
        self.0
    }

    /// The date of this weekday within the week anchored at `week_start`.
    #[must_use]
    pub fn in_week(self, week_start: NaiveDate) -> NaiveDate {
        week_start + Days::new(u64::from(self.0))
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, validating order and length.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` if `start > end` or the range spans
    /// more than `max_days` days.
    pub fn new(start: NaiveDate, end: NaiveDate, max_days: u32) -> Result<Self> {
        if start > end {
            return Err(EngineError::InvalidInput(format!(
                "range start {start} is after end {end}"
            )));
        }
        let span = (end - start).num_days() + 1;
        if span > i64::from(max_days) {
            return Err(EngineError::InvalidInput(format!(
                "range of {span} days exceeds the limit of {max_days}"
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering a single day.
    #[must_use]
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// First day (inclusive).
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day (inclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn week_start_is_previous_sunday() {
        // 2024-03-06 is a Wednesday.
        assert_eq!(week_start(date("2024-03-06")), date("2024-03-03"));
        // Saturday stays in the same week.
        assert_eq!(week_start(date("2024-03-09")), date("2024-03-03"));
    }

    #[test]
    fn week_start_of_sunday_is_itself() {
        assert_eq!(week_start(date("2024-03-10")), date("2024-03-10"));
    }

    #[test]
    fn week_start_crosses_month_and_year() {
        assert_eq!(week_start(date("2024-01-02")), date("2023-12-31"));
    }

    #[test]
    fn thursday_in_week() {
        assert_eq!(
            DayOfWeek::THURSDAY.in_week(date("2024-03-03")),
            date("2024-03-07")
        );
    }

    #[test]
    fn day_of_week_bounds() {
        assert!(DayOfWeek::new(6).is_ok());
        assert!(matches!(
            DayOfWeek::new(7),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(matches!(
            parse_date("2024-02-30"),
            Err(EngineError::InvalidDate(_))
        ));
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn date_range_validation() {
        let start = date("2024-03-01");
        let end = date("2024-03-07");
        let range = DateRange::new(start, end, 31).unwrap();
        assert!(range.contains(date("2024-03-04")));
        assert!(!range.contains(date("2024-03-08")));
        assert!(DateRange::new(end, start, 31).is_err());
        assert!(DateRange::new(start, end, 6).is_err());
        assert!(DateRange::new(start, end, 7).is_ok());
    }
}
