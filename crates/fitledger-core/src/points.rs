//! Points ledger types for fitledger.
//!
//! Every award creates exactly one [`PointsLedgerEntry`]. The tuple
//! `(user_id, action_key, context_id, date_awarded)` is the idempotency key;
//! the per-user balance in [`UserPoints`] is a projection over the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, Result};
use crate::nutrition::MealType;
use crate::{CheckinConfigId, RoutineItemId, UserId};

/// Maximum length of an action key or context id.
pub const MAX_KEY_LEN: usize = 128;

/// An action category, e.g. `ROUTINE_COMPLETE` or `MEAL_LOGGED_LUNCH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionKey(String);

impl ActionKey {
    /// Completing an item of the user's routine.
    pub const ROUTINE_COMPLETE: &'static str = "ROUTINE_COMPLETE";

    /// Completing the weekly check-in.
    pub const CHECKIN_COMPLETE: &'static str = "CHECKIN_COMPLETE";

    /// Create an action key. Keys are normalized to upper case.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for empty or oversized keys, or keys
    /// containing a NUL byte (reserved as the storage key separator).
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into().trim().to_ascii_uppercase();
        validate_key_part("action_key", &key)?;
        Ok(Self(key))
    }

    /// The routine completion action.
    #[must_use]
    pub fn routine_complete() -> Self {
        Self(Self::ROUTINE_COMPLETE.to_string())
    }

    /// The weekly check-in completion action.
    #[must_use]
    pub fn checkin_complete() -> Self {
        Self(Self::CHECKIN_COMPLETE.to_string())
    }

    /// The meal diary action for one meal type, e.g. `MEAL_LOGGED_DINNER`.
    #[must_use]
    pub fn meal_logged(meal_type: MealType) -> Self {
        Self(format!(
            "MEAL_LOGGED_{}",
            meal_type.as_str().to_ascii_uppercase()
        ))
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActionKey {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ActionKey> for String {
    fn from(key: ActionKey) -> Self {
        key.0
    }
}

/// Distinguishes instances of the same action on the same day, e.g. the
/// routine item id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextId(String);

impl ContextId {
    /// Create a context id.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for empty or oversized ids, or ids
    /// containing a NUL byte.
    pub fn new(context: impl Into<String>) -> Result<Self> {
        let context = context.into().trim().to_string();
        validate_key_part("context_id", &context)?;
        Ok(Self(context))
    }

    /// Context for a routine item completion.
    #[must_use]
    pub fn routine_item(item_id: RoutineItemId) -> Self {
        Self(item_id.to_string())
    }

    /// Context for a weekly check-in.
    #[must_use]
    pub fn checkin(config_id: CheckinConfigId) -> Self {
        Self(config_id.to_string())
    }

    /// Context for a meal diary award.
    #[must_use]
    pub fn meal(meal_type: MealType) -> Self {
        Self(meal_type.as_str().to_string())
    }

    /// The context as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContextId {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ContextId> for String {
    fn from(context: ContextId) -> Self {
        context.0
    }
}

fn validate_key_part(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} must not be empty")));
    }
    if value.len() > MAX_KEY_LEN {
        return Err(EngineError::InvalidInput(format!(
            "{field} exceeds {MAX_KEY_LEN} bytes"
        )));
    }
    if value.contains('\0') {
        return Err(EngineError::InvalidInput(format!(
            "{field} must not contain NUL"
        )));
    }
    Ok(())
}

/// The idempotency key of one award.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    /// The user receiving points.
    pub user_id: UserId,
    /// Action category.
    pub action_key: ActionKey,
    /// Disambiguating context.
    pub context_id: ContextId,
    /// Calendar day the action is attributed to.
    pub date: NaiveDate,
}

impl LedgerKey {
    /// Build a key.
    #[must_use]
    pub const fn new(
        user_id: UserId,
        action_key: ActionKey,
        context_id: ContextId,
        date: NaiveDate,
    ) -> Self {
        Self {
            user_id,
            action_key,
            context_id,
            date,
        }
    }
}

/// One awarded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsLedgerEntry {
    /// The user that received the points.
    pub user_id: UserId,
    /// Action category.
    pub action_key: ActionKey,
    /// Disambiguating context.
    pub context_id: ContextId,
    /// Calendar day the award is attributed to.
    pub date_awarded: NaiveDate,
    /// Points granted by this entry (always positive).
    pub points_awarded: i64,
    /// When the entry was written.
    pub awarded_at: DateTime<Utc>,
}

impl PointsLedgerEntry {
    /// Create an entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` if `points` is not positive.
    pub fn new(key: LedgerKey, points: i64, awarded_at: DateTime<Utc>) -> Result<Self> {
        if points <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "points amount must be positive, got {points}"
            )));
        }
        Ok(Self {
            user_id: key.user_id,
            action_key: key.action_key,
            context_id: key.context_id,
            date_awarded: key.date,
            points_awarded: points,
            awarded_at,
        })
    }

    /// The idempotency key of this entry.
    #[must_use]
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(
            self.user_id,
            self.action_key.clone(),
            self.context_id.clone(),
            self.date_awarded,
        )
    }
}

/// The denormalized points balance of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoints {
    /// The user.
    pub user_id: UserId,
    /// Running balance, never negative.
    pub points: i64,
    /// Last balance change.
    pub updated_at: DateTime<Utc>,
}

impl UserPoints {
    /// A user with no points yet.
    #[must_use]
    pub const fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            points: 0,
            updated_at: now,
        }
    }

    /// Add awarded points.
    pub fn credit(&mut self, points: i64, now: DateTime<Utc>) {
        self.points = self.points.saturating_add(points);
        self.updated_at = now;
    }

    /// Remove revoked points, clamping at zero.
    pub fn debit(&mut self, points: i64, now: DateTime<Utc>) {
        self.points = self.points.saturating_sub(points).max(0);
        self.updated_at = now;
    }
}

/// Result of an award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardOutcome {
    /// Points granted by this call: the requested amount, or 0 if the action
    /// was already awarded for that day.
    pub points_awarded: i64,
    /// Balance after the call.
    pub new_total_points: i64,
}

impl AwardOutcome {
    /// Whether the award already existed.
    #[must_use]
    pub const fn already_awarded(&self) -> bool {
        self.points_awarded == 0
    }
}

/// Result of a revoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeOutcome {
    /// Points taken back (0 if there was nothing to revoke).
    pub points_revoked: i64,
    /// Balance after the call.
    pub new_total_points: i64,
}

/// Result of recomputing a balance from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Balance stored before reconciliation.
    pub previous_balance: i64,
    /// Sum of all ledger entries, now the stored balance.
    pub ledger_total: i64,
}

impl Reconciliation {
    /// Signed difference the reconciliation corrected.
    #[must_use]
    pub const fn drift(&self) -> i64 {
        self.ledger_total - self.previous_balance
    }
}
