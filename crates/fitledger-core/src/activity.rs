//! Routine completions and activity classification.
//!
//! Exercise minutes are split into two buckets. Strength training
//! ("musculação") and crossfit count as **workout**; every other exercise
//! counts as **cardio**. An instance without a recorded duration gets the
//! bucket's default duration.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::nutrition::round2;
use crate::{RoutineItemId, UserId};

/// Default minutes credited to a workout instance with no duration.
pub const DEFAULT_WORKOUT_MINUTES: u32 = 45;

/// Default minutes credited to a cardio instance with no duration.
pub const DEFAULT_CARDIO_MINUTES: u32 = 30;

/// Longest duration accepted for one exercise instance (one full day).
pub const MAX_EXERCISE_MINUTES: u32 = 24 * 60;

/// Name fragments that classify an exercise as workout, compared after
/// lowercasing and folding accents.
const WORKOUT_MARKERS: [&str; 3] = ["musculacao", "strength training", "crossfit"];

/// Exercise metadata of a routine item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineItem {
    /// Routine item id.
    pub id: RoutineItemId,
    /// Exercise display name, e.g. "Musculação - Peito".
    pub exercise_name: String,
    /// Optional exercise type tag, e.g. "crossfit" or "corrida".
    pub exercise_type: Option<String>,
}

impl RoutineItem {
    /// The activity bucket this exercise falls into.
    #[must_use]
    pub fn category(&self) -> ActivityCategory {
        ActivityCategory::classify(&self.exercise_name, self.exercise_type.as_deref())
    }
}

/// Activity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    /// Strength training and crossfit.
    Workout,
    /// Everything else.
    Cardio,
}

impl ActivityCategory {
    /// Classify an exercise from its name and optional type tag.
    #[must_use]
    pub fn classify(name: &str, exercise_type: Option<&str>) -> Self {
        let matches = |text: &str| {
            let folded = fold(text);
            WORKOUT_MARKERS.iter().any(|marker| folded.contains(marker))
        };
        if matches(name) || exercise_type.is_some_and(matches) {
            Self::Workout
        } else {
            Self::Cardio
        }
    }

    /// Minutes credited when no duration was recorded.
    #[must_use]
    pub const fn default_minutes(self) -> u32 {
        match self {
            Self::Workout => DEFAULT_WORKOUT_MINUTES,
            Self::Cardio => DEFAULT_CARDIO_MINUTES,
        }
    }
}

/// Lowercase and strip the Portuguese diacritics exercise names carry.
fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            '-' | '_' => ' ',
            other => other,
        })
        .collect()
}

/// One routine item completion. At most one row per user, item and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineLogEvent {
    /// Owner.
    pub user_id: UserId,
    /// Completed routine item.
    pub routine_item_id: RoutineItemId,
    /// Day of the completion.
    pub date: NaiveDate,
    /// Whether the item counts as done.
    pub is_completed: bool,
    /// Recorded duration, if the user entered one.
    pub exercise_duration_minutes: Option<u32>,
    /// When the row was written.
    pub logged_at: DateTime<Utc>,
}

impl RoutineLogEvent {
    /// Validate the recorded duration.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for durations longer than a day.
    pub fn validate(&self) -> Result<()> {
        match self.exercise_duration_minutes {
            Some(minutes) if minutes > MAX_EXERCISE_MINUTES => Err(EngineError::InvalidInput(
                format!("exercise duration {minutes} exceeds {MAX_EXERCISE_MINUTES} minutes"),
            )),
            _ => Ok(()),
        }
    }

    /// Minutes this completion contributes, given its exercise category.
    ///
    /// Incomplete rows contribute nothing. A recorded zero is treated as
    /// "no duration recorded".
    #[must_use]
    pub fn effective_minutes(&self, category: ActivityCategory) -> u32 {
        if !self.is_completed {
            return 0;
        }
        match self.exercise_duration_minutes {
            Some(minutes) if minutes > 0 => minutes,
            _ => category.default_minutes(),
        }
    }
}

/// Accumulated exercise minutes per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMinutes {
    /// Workout minutes.
    pub workout: u32,
    /// Cardio minutes.
    pub cardio: u32,
}

impl ActivityMinutes {
    /// Add minutes to a bucket.
    pub fn add(&mut self, category: ActivityCategory, minutes: u32) {
        match category {
            ActivityCategory::Workout => self.workout = self.workout.saturating_add(minutes),
            ActivityCategory::Cardio => self.cardio = self.cardio.saturating_add(minutes),
        }
    }

    /// Workout time in hours, two decimals.
    #[must_use]
    pub fn workout_hours(&self) -> f64 {
        round2(f64::from(self.workout) / 60.0)
    }

    /// Cardio time in hours, two decimals.
    #[must_use]
    pub fn cardio_hours(&self) -> f64 {
        round2(f64::from(self.cardio) / 60.0)
    }
}
