//! Engine configuration.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use fitledger_core::{EngineError, Result};

/// Default points for completing a routine item.
pub const DEFAULT_POINTS_ROUTINE_COMPLETE: i64 = 5;

/// Default points for the first meal of a type logged on a day.
pub const DEFAULT_POINTS_MEAL_LOGGED: i64 = 2;

/// Default points for completing a weekly check-in.
pub const DEFAULT_POINTS_CHECKIN_COMPLETE: i64 = 10;

/// Default cap on the length of a range report, in days.
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 366;

/// Largest accepted UTC offset (±18h, as chrono allows).
const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Points for `ROUTINE_COMPLETE`.
    pub points_routine_complete: i64,
    /// Points for `MEAL_LOGGED_{TYPE}`.
    pub points_meal_logged: i64,
    /// Points for `CHECKIN_COMPLETE`.
    pub points_checkin_complete: i64,
    /// Award points when a meal is logged.
    pub award_meal_points: bool,
    /// Award points when a check-in is submitted.
    pub award_checkin_points: bool,
    /// Longest accepted range report.
    pub max_range_days: u32,
    /// Offset of the users' calendar from UTC; defines "today".
    pub utc_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            points_routine_complete: DEFAULT_POINTS_ROUTINE_COMPLETE,
            points_meal_logged: DEFAULT_POINTS_MEAL_LOGGED,
            points_checkin_complete: DEFAULT_POINTS_CHECKIN_COMPLETE,
            award_meal_points: true,
            award_checkin_points: true,
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
            utc_offset_minutes: 0,
        }
    }
}

impl EngineConfig {
    /// Check amounts, range cap and offset.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` describing the first bad setting.
    pub fn validate(&self) -> Result<()> {
        for (name, points) in [
            ("points_routine_complete", self.points_routine_complete),
            ("points_meal_logged", self.points_meal_logged),
            ("points_checkin_complete", self.points_checkin_complete),
        ] {
            if points <= 0 {
                return Err(EngineError::InvalidInput(format!(
                    "{name} must be positive, got {points}"
                )));
            }
        }
        if self.max_range_days == 0 {
            return Err(EngineError::InvalidInput(
                "max_range_days must be at least 1".into(),
            ));
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(EngineError::InvalidInput(format!(
                "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}"
            )));
        }
        Ok(())
    }

    /// The calendar offset. Out-of-range values fall back to UTC.
    #[must_use]
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }
}
