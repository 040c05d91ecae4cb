//! Points ledger.
//!
//! An award is one [`PointsLedgerEntry`] per
//! `(user_id, action_key, context_id, date)`. The entry insert is the only
//! correctness gate: the entry key is read with a row lock, and the balance
//! is incremented in the same transaction only when the entry was absent.

use chrono::{DateTime, NaiveDate, Utc};

use fitledger_core::{
    ActionKey, AwardOutcome, ContextId, EngineError, LedgerKey, PointsLedgerEntry,
    Reconciliation, Result, RevokeOutcome, UserId, UserPoints,
};
use fitledger_store::{HistoryPage, Transaction};

use crate::Engine;

/// Largest page a history request may ask for.
pub const MAX_HISTORY_LIMIT: usize = 500;

/// The points ledger of an [`Engine`].
#[derive(Clone, Copy)]
pub struct PointsLedger<'e> {
    engine: &'e Engine,
}

impl<'e> PointsLedger<'e> {
    pub(crate) const fn new(engine: &'e Engine) -> Self {
        Self { engine }
    }

    /// Award `amount` points for an action, at most once per day.
    ///
    /// `date` defaults to today. Returns `points_awarded = 0` without error
    /// when the action was already awarded for that day.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for a non-positive amount, or a
    /// storage error (nothing committed).
    pub fn award(
        &self,
        user_id: UserId,
        action_key: ActionKey,
        context_id: ContextId,
        amount: i64,
        date: Option<NaiveDate>,
    ) -> Result<AwardOutcome> {
        validate_amount(amount)?;
        let now = self.engine.now();
        let date = date.unwrap_or_else(|| self.engine.today_at(now));
        let key = LedgerKey::new(user_id, action_key, context_id, date);

        let mut tx = self.engine.begin()?;
        let outcome = award_in(&mut tx, key, amount, now)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Revoke the award for an action on a day, if present.
    ///
    /// The balance is decremented by the entry's amount, clamped at zero.
    /// Revoking a missing award returns `points_revoked = 0`.
    ///
    /// # Errors
    ///
    /// Returns a storage error (nothing committed).
    pub fn revoke(
        &self,
        user_id: UserId,
        action_key: ActionKey,
        context_id: ContextId,
        date: NaiveDate,
    ) -> Result<RevokeOutcome> {
        let now = self.engine.now();
        let key = LedgerKey::new(user_id, action_key, context_id, date);

        let mut tx = self.engine.begin()?;
        let outcome = revoke_in(&mut tx, &key, now)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Current balance (0 for users that never earned points).
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn balance(&self, user_id: UserId) -> Result<i64> {
        let mut tx = self.engine.begin()?;
        Ok(tx.user_points(user_id)?.map_or(0, |row| row.points))
    }

    /// A page of ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidInput` for a zero or oversized limit.
    pub fn history(&self, user_id: UserId, limit: usize, offset: usize) -> Result<HistoryPage> {
        if limit == 0 || limit > MAX_HISTORY_LIMIT {
            return Err(EngineError::InvalidInput(format!(
                "limit must be within 1..={MAX_HISTORY_LIMIT}"
            )));
        }
        let mut tx = self.engine.begin()?;
        Ok(tx.ledger_history(user_id, limit, offset)?)
    }

    /// Recompute the balance as the sum of the user's ledger entries and
    /// store it.
    ///
    /// # Errors
    ///
    /// Returns a storage error (nothing committed).
    pub fn reconcile(&self, user_id: UserId) -> Result<Reconciliation> {
        let now = self.engine.now();
        let mut tx = self.engine.begin()?;

        let existing = tx.user_points_for_update(user_id)?;
        let ledger_total = tx
            .ledger_entries(user_id)?
            .iter()
            .fold(0i64, |sum, entry| sum.saturating_add(entry.points_awarded));
        let previous_balance = existing.as_ref().map_or(0, |row| row.points);

        let reconciliation = Reconciliation {
            previous_balance,
            ledger_total,
        };
        if reconciliation.drift() != 0 {
            let mut row = existing.unwrap_or_else(|| UserPoints::new(user_id, now));
            row.points = ledger_total;
            row.updated_at = now;
            tx.put_user_points(&row)?;
            tracing::warn!(
                user_id = %user_id,
                previous_balance,
                ledger_total,
                drift = reconciliation.drift(),
                "Points balance drifted from ledger; corrected"
            );
        } else {
            tracing::debug!(user_id = %user_id, ledger_total, "Points balance matches ledger");
        }

        tx.commit()?;
        Ok(reconciliation)
    }
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "points amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// Award inside an open transaction.
///
/// The ledger key is locked before the balance row; every caller takes the
/// locks in this order.
pub(crate) fn award_in(
    tx: &mut Transaction<'_>,
    key: LedgerKey,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<AwardOutcome> {
    let existing = tx.ledger_entry_for_update(&key)?;
    let mut balance = tx
        .user_points_for_update(key.user_id)?
        .unwrap_or_else(|| UserPoints::new(key.user_id, now));

    if existing.is_some() {
        tracing::debug!(
            user_id = %key.user_id,
            action_key = %key.action_key,
            context_id = %key.context_id,
            date = %key.date,
            "Points already awarded"
        );
        return Ok(AwardOutcome {
            points_awarded: 0,
            new_total_points: balance.points,
        });
    }

    let entry = PointsLedgerEntry::new(key, amount, now)?;
    tx.insert_ledger_entry(&entry)?;
    balance.credit(amount, now);
    tx.put_user_points(&balance)?;

    tracing::info!(
        user_id = %entry.user_id,
        action_key = %entry.action_key,
        context_id = %entry.context_id,
        date = %entry.date_awarded,
        points = amount,
        new_total = balance.points,
        "Points awarded"
    );

    Ok(AwardOutcome {
        points_awarded: amount,
        new_total_points: balance.points,
    })
}

/// Revoke inside an open transaction.
pub(crate) fn revoke_in(
    tx: &mut Transaction<'_>,
    key: &LedgerKey,
    now: DateTime<Utc>,
) -> Result<RevokeOutcome> {
    let existing = tx.ledger_entry_for_update(key)?;
    let balance = tx.user_points_for_update(key.user_id)?;

    let Some(entry) = existing else {
        tracing::debug!(
            user_id = %key.user_id,
            action_key = %key.action_key,
            context_id = %key.context_id,
            date = %key.date,
            "Nothing to revoke"
        );
        return Ok(RevokeOutcome {
            points_revoked: 0,
            new_total_points: balance.map_or(0, |row| row.points),
        });
    };

    tx.delete_ledger_entry(&entry)?;
    let mut balance = balance.unwrap_or_else(|| UserPoints::new(key.user_id, now));
    balance.debit(entry.points_awarded, now);
    tx.put_user_points(&balance)?;

    tracing::info!(
        user_id = %entry.user_id,
        action_key = %entry.action_key,
        context_id = %entry.context_id,
        date = %entry.date_awarded,
        points = entry.points_awarded,
        new_total = balance.points,
        "Points revoked"
    );

    Ok(RevokeOutcome {
        points_revoked: entry.points_awarded,
        new_total_points: balance.points,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{day, engine_at, noon, race, user};

    fn routine(engine: &Engine, context: &str, amount: i64) -> AwardOutcome {
        engine
            .ledger()
            .award(
                user(1),
                ActionKey::routine_complete(),
                ContextId::new(context).unwrap(),
                amount,
                Some(day("2024-03-01")),
            )
            .unwrap()
    }

    #[test]
    fn award_is_idempotent_per_day() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));

        let first = routine(&engine, "42", 5);
        assert_eq!(first.points_awarded, 5);
        assert_eq!(first.new_total_points, 5);

        let second = routine(&engine, "42", 5);
        assert_eq!(second.points_awarded, 0);
        assert!(second.already_awarded());
        assert_eq!(second.new_total_points, 5);

        assert_eq!(engine.ledger().balance(user(1)).unwrap(), 5);
        let page = engine.ledger().history(user(1), 10, 0).unwrap();
        assert_eq!(page.entries.len(), 1);
    }

    fn assert_double_tap_credits_once(engine: Engine) {
        let engine = Arc::new(engine);
        let outcomes = race(&engine, 16, |engine| routine(engine, "42", 5));

        let credited: i64 = outcomes.iter().map(|o| o.points_awarded).sum();
        assert_eq!(credited, 5);
        assert_eq!(outcomes.iter().filter(|o| !o.already_awarded()).count(), 1);
        assert!(outcomes.iter().all(|o| o.new_total_points == 5));
        assert_eq!(engine.ledger().balance(user(1)).unwrap(), 5);
        assert_eq!(engine.ledger().history(user(1), 50, 0).unwrap().entries.len(), 1);
        assert_eq!(engine.ledger().reconcile(user(1)).unwrap().drift(), 0);
    }

    #[test]
    fn concurrent_duplicate_awards_credit_once() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));
        assert_double_tap_credits_once(engine);
    }

    #[cfg(feature = "rocksdb-backend")]
    #[test]
    fn concurrent_duplicate_awards_credit_once_on_rocksdb() {
        let (engine, _clock, _dir) = crate::test_support::rocks_engine_at(noon("2024-03-01"));
        assert_double_tap_credits_once(engine);
    }

    #[test]
    fn different_context_or_day_awards_again() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));
        routine(&engine, "42", 5);
        routine(&engine, "43", 5);
        let next_day = engine
            .ledger()
            .award(
                user(1),
                ActionKey::routine_complete(),
                ContextId::new("42").unwrap(),
                5,
                Some(day("2024-03-02")),
            )
            .unwrap();
        assert_eq!(next_day.points_awarded, 5);
        assert_eq!(engine.ledger().balance(user(1)).unwrap(), 15);
    }

    #[test]
    fn date_defaults_to_today() {
        let (engine, _clock) = engine_at(noon("2024-03-05"));
        engine
            .ledger()
            .award(
                user(1),
                ActionKey::checkin_complete(),
                ContextId::new("1").unwrap(),
                10,
                None,
            )
            .unwrap();
        let page = engine.ledger().history(user(1), 1, 0).unwrap();
        assert_eq!(page.entries[0].date_awarded, day("2024-03-05"));
    }

    #[test]
    fn non_positive_amount_rejected_without_writes() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));
        let err = engine
            .ledger()
            .award(
                user(1),
                ActionKey::routine_complete(),
                ContextId::new("42").unwrap(),
                0,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(engine
            .ledger()
            .history(user(1), 10, 0)
            .unwrap()
            .entries
            .is_empty());
    }

    #[test]
    fn revoke_is_idempotent() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));
        routine(&engine, "42", 5);
        routine(&engine, "43", 5);

        let revoke = || {
            engine
                .ledger()
                .revoke(
                    user(1),
                    ActionKey::routine_complete(),
                    ContextId::new("42").unwrap(),
                    day("2024-03-01"),
                )
                .unwrap()
        };
        let first = revoke();
        assert_eq!(first.points_revoked, 5);
        assert_eq!(first.new_total_points, 5);

        let second = revoke();
        assert_eq!(second.points_revoked, 0);
        assert_eq!(second.new_total_points, 5);

        // The revoked award can be earned again.
        assert_eq!(routine(&engine, "42", 5).points_awarded, 5);
    }

    #[test]
    fn revoke_clamps_balance_at_zero() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));
        routine(&engine, "42", 5);

        // Simulate a balance that fell behind the ledger.
        {
            let mut tx = engine.begin().unwrap();
            let mut row = tx.user_points(user(1)).unwrap().unwrap();
            row.points = 2;
            tx.put_user_points(&row).unwrap();
            tx.commit().unwrap();
        }

        let outcome = engine
            .ledger()
            .revoke(
                user(1),
                ActionKey::routine_complete(),
                ContextId::new("42").unwrap(),
                day("2024-03-01"),
            )
            .unwrap();
        assert_eq!(outcome.points_revoked, 5);
        assert_eq!(outcome.new_total_points, 0);
    }

    #[test]
    fn reconcile_fixes_drift() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));
        routine(&engine, "42", 5);
        routine(&engine, "43", 7);

        {
            let mut tx = engine.begin().unwrap();
            let mut row = tx.user_points(user(1)).unwrap().unwrap();
            row.points = 100;
            tx.put_user_points(&row).unwrap();
            tx.commit().unwrap();
        }

        let rec = engine.ledger().reconcile(user(1)).unwrap();
        assert_eq!(rec.previous_balance, 100);
        assert_eq!(rec.ledger_total, 12);
        assert_eq!(rec.drift(), -88);
        assert_eq!(engine.ledger().balance(user(1)).unwrap(), 12);

        let again = engine.ledger().reconcile(user(1)).unwrap();
        assert_eq!(again.drift(), 0);
    }

    #[test]
    fn history_limit_validated() {
        let (engine, _clock) = engine_at(noon("2024-03-01"));
        assert!(engine.ledger().history(user(1), 0, 0).is_err());
        assert!(engine
            .ledger()
            .history(user(1), MAX_HISTORY_LIMIT + 1, 0)
            .is_err());
    }
}
