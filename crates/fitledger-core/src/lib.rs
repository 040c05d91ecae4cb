//! Core types and rules for fitledger.
//!
//! This crate provides the domain types shared by the fitledger store,
//! engine and service:
//!
//! - **Identifiers**: `UserId`, `RoutineItemId`, `CheckinConfigId`, `MealLogId`, ...
//! - **Points**: `PointsLedgerEntry`, `UserPoints`, `ActionKey`, `ContextId`
//! - **Diary events**: `MealLogEvent`, `RoutineLogEvent`, `RoutineItem`
//! - **Tracking**: `DailyTrackingRecord`, `DailyTotals`, `RangeTotals`
//! - **Check-ins**: `CheckinConfig`, `CheckinWindow`, `CheckinAvailability`
//!
//! # Points
//!
//! Points are whole numbers stored as `i64`. An award is identified by
//! `(user_id, action_key, context_id, date)`; the same tuple never earns
//! points twice.
//!
//! # Calendar
//!
//! Dates are plain calendar days (`NaiveDate`). Weeks start on Sunday.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod activity;
pub mod calendar;
pub mod checkin;
pub mod error;
pub mod ids;
pub mod nutrition;
pub mod points;
pub mod tracking;

pub use activity::{
    ActivityCategory, ActivityMinutes, RoutineItem, RoutineLogEvent, DEFAULT_CARDIO_MINUTES,
    DEFAULT_WORKOUT_MINUTES, MAX_EXERCISE_MINUTES,
};
pub use calendar::{parse_date, week_start, DateRange, DayOfWeek};
pub use checkin::{
    is_distributed_to, latest_in_window, CheckinAvailability, CheckinConfig, CheckinDistribution,
    CheckinQuestion, CheckinResponse, CheckinState, CheckinWindow, DistributionTarget, GroupKind,
    Memberships, QuestionKind, QuestionResponse, ResponseAnswer,
};
pub use error::{EngineError, Result};
pub use ids::{
    CheckinConfigId, GroupId, IdError, MealLogId, QuestionId, RecipeId, ResponseId,
    RoutineItemId, UserId,
};
pub use nutrition::{round2, Macros, MealLogEvent, MealSource, MealType};
pub use points::{
    ActionKey, AwardOutcome, ContextId, LedgerKey, PointsLedgerEntry, Reconciliation,
    RevokeOutcome, UserPoints,
};
pub use tracking::{DailyTotals, DailyTrackingRecord, DayTotals, RangeTotals};
