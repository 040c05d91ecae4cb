//! Meal diary events and nutrition sums.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::{MealLogId, RecipeId, UserId};

/// Meal slot of a diary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    /// Breakfast.
    Breakfast,
    /// Lunch.
    Lunch,
    /// Snack between meals.
    Snack,
    /// Dinner.
    Dinner,
    /// Late supper.
    Supper,
}

impl MealType {
    /// Get the meal type as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Snack => "snack",
            Self::Dinner => "dinner",
            Self::Supper => "supper",
        }
    }
}

impl FromStr for MealType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "snack" => Ok(Self::Snack),
            "dinner" => Ok(Self::Dinner),
            "supper" => Ok(Self::Supper),
            other => Err(EngineError::InvalidInput(format!("unknown meal type: {other}"))),
        }
    }
}

/// What was eaten: a catalog recipe or a free-text item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSource {
    /// A recipe from the content catalog.
    Recipe(RecipeId),
    /// A custom item typed by the user.
    Custom(String),
}

/// Energy and macronutrients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    /// Energy in kcal.
    pub kcal: f64,
    /// Protein in grams.
    pub protein_g: f64,
    /// Carbohydrates in grams.
    pub carbs_g: f64,
    /// Fat in grams.
    pub fat_g: f64,
}

impl Macros {
    /// Reject negative or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("kcal", self.kcal),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidInput(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        Ok(())
    }

    /// Component-wise sum.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self {
            kcal: self.kcal + other.kcal,
            protein_g: self.protein_g + other.protein_g,
            carbs_g: self.carbs_g + other.carbs_g,
            fat_g: self.fat_g + other.fat_g,
        }
    }

    /// Round every component to two decimals.
    #[must_use]
    pub fn rounded(self) -> Self {
        Self {
            kcal: round2(self.kcal),
            protein_g: round2(self.protein_g),
            carbs_g: round2(self.carbs_g),
            fat_g: round2(self.fat_g),
        }
    }

    /// Sum a sequence of values in iteration order, then round.
    pub fn sum<'a>(items: impl IntoIterator<Item = &'a Self>) -> Self {
        items
            .into_iter()
            .fold(Self::default(), |acc, m| acc.plus(*m))
            .rounded()
    }
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One diary row. Immutable once written; edits are delete + insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLogEvent {
    /// Row id.
    pub id: MealLogId,
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
    /// Nutrition consumed (already multiplied by servings).
    pub consumed: Macros,
    /// When the row was written.
    pub logged_at: DateTime<Utc>,
}

impl MealLogEvent {
    /// Validate the row before it is stored.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for non-positive servings, empty
    /// custom names or invalid macros.
    pub fn validate(&self) -> Result<()> {
        if !self.servings.is_finite() || self.servings <= 0.0 {
            return Err(EngineError::InvalidInput(
                "servings must be a positive number".into(),
            ));
        }
        if let MealSource::Custom(name) = &self.source {
            if name.trim().is_empty() {
                return Err(EngineError::InvalidInput(
                    "custom meal name must not be empty".into(),
                ));
            }
        }
        self.consumed.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_rounds_after_adding() {
        let items = [
            Macros {
                kcal: 100.004,
                protein_g: 1.0,
                carbs_g: 2.0,
                fat_g: 0.333,
            },
            Macros {
                kcal: 50.004,
                protein_g: 0.5,
                carbs_g: 0.0,
                fat_g: 0.333,
            },
        ];
        let total = Macros::sum(&items);
        assert!((total.kcal - 150.01).abs() < f64::EPSILON);
        assert!((total.fat_g - 0.67).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_sum_is_zero() {
        let none: [Macros; 0] = [];
        assert_eq!(Macros::sum(&none), Macros::default());
    }

    #[test]
    fn negative_macros_rejected() {
        let bad = Macros {
            kcal: -1.0,
            ..Macros::default()
        };
        assert!(bad.validate().is_err());
        assert!(Macros {
            fat_g: f64::NAN,
            ..Macros::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn meal_type_serde_name() {
        let json = serde_json::to_string(&MealType::Breakfast).unwrap();
        assert_eq!(json, "\"breakfast\"");
    }

    #[test]
    fn meal_type_parses_case_insensitively() {
        assert_eq!(" Dinner".parse::<MealType>().unwrap(), MealType::Dinner);
        assert!("brunch".parse::<MealType>().is_err());
    }
}
