//! Typed table access inside one store transaction.
//!
//! A [`Transaction`] wraps a backend [`KvTransaction`] and knows how every
//! table is keyed and encoded. Reads that guard a uniqueness decision (the
//! ledger key, the balance row, the availability row) have `_for_update`
//! variants that lock the row until commit.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use fitledger_core::{
    CheckinAvailability, CheckinConfig, CheckinConfigId, CheckinDistribution, CheckinQuestion,
    CheckinResponse, DailyTrackingRecord, GroupId, GroupKind, LedgerKey, MealLogEvent, MealLogId,
    Memberships, PointsLedgerEntry, RoutineItem, RoutineItemId, RoutineLogEvent, UserId,
    UserPoints,
};

use crate::error::{Result, StoreError};
use crate::schema::cf;
use crate::{codec, keys, KvPair, KvTransaction, Store};

/// One page of a user's ledger history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    /// Entries, newest first.
    pub entries: Vec<PointsLedgerEntry>,
    /// Whether older entries exist past this page.
    pub has_more: bool,
}

/// A store transaction with typed table accessors.
///
/// Dropping a `Transaction` without calling [`commit`](Self::commit) rolls
/// back every write made through it.
pub struct Transaction<'s> {
    inner: Box<dyn KvTransaction + 's>,
}

impl<'s> Transaction<'s> {
    /// Open a transaction on `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start a transaction.
    pub fn begin<S: Store + ?Sized>(store: &'s S) -> Result<Self> {
        Ok(Self {
            inner: store.begin()?,
        })
    }

    /// Commit every write made through this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing was applied in that case.
    pub fn commit(self) -> Result<()> {
        self.inner.commit()
    }

    // =========================================================================
    // Encoding helpers
    // =========================================================================

    fn read<T: DeserializeOwned>(&mut self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        self.inner
            .get(cf, key)?
            .map(|data| codec::deserialize(&data))
            .transpose()
    }

    fn read_for_update<T: DeserializeOwned>(&mut self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        self.inner
            .get_for_update(cf, key)?
            .map(|data| codec::deserialize(&data))
            .transpose()
    }

    fn write<T: Serialize>(&mut self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let value = codec::serialize(value)?;
        self.inner.put(cf, key, &value)
    }

    fn decode_all<T: DeserializeOwned>(rows: Vec<KvPair>) -> Result<Vec<T>> {
        rows.into_iter()
            .map(|(_, value)| codec::deserialize(&value))
            .collect()
    }

    fn scan<T: DeserializeOwned>(&mut self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let rows = self.inner.scan_prefix(cf, prefix)?;
        Self::decode_all(rows)
    }

    fn scan_days<T: DeserializeOwned>(
        &mut self,
        cf: &str,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<T>> {
        let (from, to) = keys::user_date_bounds(user_id, start, end);
        let rows = self.inner.scan_range(cf, &from, to.as_deref())?;
        Self::decode_all(rows)
    }

    fn delete_prefix(&mut self, cf: &str, prefix: &[u8]) -> Result<()> {
        for (key, _) in self.inner.scan_prefix(cf, prefix)? {
            self.inner.delete(cf, &key)?;
        }
        Ok(())
    }

    // =========================================================================
    // Points ledger
    // =========================================================================

    /// Get a ledger entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ledger_entry(&mut self, key: &LedgerKey) -> Result<Option<PointsLedgerEntry>> {
        self.read(cf::LEDGER, &keys::ledger_key(key))
    }

    /// Get a ledger entry and lock its key until commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the lock times out.
    pub fn ledger_entry_for_update(
        &mut self,
        key: &LedgerKey,
    ) -> Result<Option<PointsLedgerEntry>> {
        self.read_for_update(cf::LEDGER, &keys::ledger_key(key))
    }

    /// Insert a ledger entry and its history index row.
    ///
    /// The caller is responsible for checking uniqueness first with
    /// [`ledger_entry_for_update`](Self::ledger_entry_for_update).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_ledger_entry(&mut self, entry: &PointsLedgerEntry) -> Result<()> {
        self.write(cf::LEDGER, &keys::ledger_key(&entry.key()), entry)?;
        self.inner
            .put(cf::LEDGER_BY_USER, &keys::ledger_index_key(entry), &[])
    }

    /// Delete a ledger entry and its history index row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_ledger_entry(&mut self, entry: &PointsLedgerEntry) -> Result<()> {
        self.inner
            .delete(cf::LEDGER, &keys::ledger_key(&entry.key()))?;
        self.inner
            .delete(cf::LEDGER_BY_USER, &keys::ledger_index_key(entry))
    }

    /// All ledger entries of a user, in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ledger_entries(&mut self, user_id: UserId) -> Result<Vec<PointsLedgerEntry>> {
        self.scan(cf::LEDGER, &keys::user_prefix(user_id))
    }

    /// A page of a user's ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the index points
    /// at a missing entry.
    pub fn ledger_history(
        &mut self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage> {
        let mut index = self
            .inner
            .scan_prefix(cf::LEDGER_BY_USER, &keys::user_prefix(user_id))?;
        index.reverse();
        let has_more = index.len() > offset.saturating_add(limit);

        let mut entries = Vec::with_capacity(limit.min(index.len()));
        for (index_key, _) in index.into_iter().skip(offset).take(limit) {
            let ledger_key = keys::ledger_key_from_index(&index_key).ok_or_else(|| {
                StoreError::Serialization("malformed ledger index key".into())
            })?;
            let entry = self.read(cf::LEDGER, &ledger_key)?.ok_or_else(|| {
                StoreError::Corrupted("ledger index points at a missing entry".into())
            })?;
            entries.push(entry);
        }
        Ok(HistoryPage { entries, has_more })
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Get a user's balance row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn user_points(&mut self, user_id: UserId) -> Result<Option<UserPoints>> {
        self.read(cf::USER_POINTS, &keys::user_prefix(user_id))
    }

    /// Get a user's balance row and lock it until commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the lock times out.
    pub fn user_points_for_update(&mut self, user_id: UserId) -> Result<Option<UserPoints>> {
        self.read_for_update(cf::USER_POINTS, &keys::user_prefix(user_id))
    }

    /// Insert or update a user's balance row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_user_points(&mut self, points: &UserPoints) -> Result<()> {
        self.write(cf::USER_POINTS, &keys::user_prefix(points.user_id), points)
    }

    // =========================================================================
    // Meal diary
    // =========================================================================

    /// Insert a meal diary row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_meal(&mut self, meal: &MealLogEvent) -> Result<()> {
        let key = keys::meal_log_key(meal.user_id, meal.date_consumed, meal.id);
        self.write(cf::MEAL_LOGS, &key, meal)
    }

    /// Get a meal diary row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn meal(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        id: MealLogId,
    ) -> Result<Option<MealLogEvent>> {
        self.read(cf::MEAL_LOGS, &keys::meal_log_key(user_id, date, id))
    }

    /// Delete a meal diary row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_meal(&mut self, user_id: UserId, date: NaiveDate, id: MealLogId) -> Result<()> {
        self.inner
            .delete(cf::MEAL_LOGS, &keys::meal_log_key(user_id, date, id))
    }

    /// A user's meals on days `start..=end`, by day then logging order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn meals_between(
        &mut self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MealLogEvent>> {
        self.scan_days(cf::MEAL_LOGS, user_id, start, end)
    }

    // =========================================================================
    // Routine completions
    // =========================================================================

    /// Get a routine completion and lock it until commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the lock times out.
    pub fn routine_log_for_update(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        item_id: RoutineItemId,
    ) -> Result<Option<RoutineLogEvent>> {
        self.read_for_update(
            cf::ROUTINE_LOGS,
            &keys::routine_log_key(user_id, date, item_id),
        )
    }

    /// Insert or replace a routine completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_routine_log(&mut self, log: &RoutineLogEvent) -> Result<()> {
        let key = keys::routine_log_key(log.user_id, log.date, log.routine_item_id);
        self.write(cf::ROUTINE_LOGS, &key, log)
    }

    /// Delete a routine completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_routine_log(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        item_id: RoutineItemId,
    ) -> Result<()> {
        self.inner.delete(
            cf::ROUTINE_LOGS,
            &keys::routine_log_key(user_id, date, item_id),
        )
    }

    /// A user's routine completions on days `start..=end`, by day then item.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn routine_logs_between(
        &mut self,
        user_id: UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RoutineLogEvent>> {
        self.scan_days(cf::ROUTINE_LOGS, user_id, start, end)
    }

    /// Get exercise metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn routine_item(&mut self, item_id: RoutineItemId) -> Result<Option<RoutineItem>> {
        self.read(cf::ROUTINE_ITEMS, &keys::routine_item_key(item_id))
    }

    /// Insert or replace exercise metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_routine_item(&mut self, item: &RoutineItem) -> Result<()> {
        self.write(cf::ROUTINE_ITEMS, &keys::routine_item_key(item.id), item)
    }

    // =========================================================================
    // Daily tracking cache
    // =========================================================================

    /// Get a cached daily record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn tracking_record(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyTrackingRecord>> {
        self.read(cf::DAILY_TRACKING, &keys::user_date_key(user_id, date))
    }

    /// Get a cached daily record and lock it until commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the lock times out.
    pub fn tracking_record_for_update(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyTrackingRecord>> {
        self.read_for_update(cf::DAILY_TRACKING, &keys::user_date_key(user_id, date))
    }

    /// Insert or replace a cached daily record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_tracking_record(&mut self, record: &DailyTrackingRecord) -> Result<()> {
        let key = keys::user_date_key(record.user_id, record.date);
        self.write(cf::DAILY_TRACKING, &key, record)
    }

    // =========================================================================
    // Check-in configuration
    // =========================================================================

    /// Get a check-in config.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn checkin_config(&mut self, config_id: CheckinConfigId) -> Result<Option<CheckinConfig>> {
        self.read(cf::CHECKIN_CONFIGS, &keys::checkin_config_key(config_id))
    }

    /// All check-in configs, by ascending id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn checkin_configs(&mut self) -> Result<Vec<CheckinConfig>> {
        self.scan(cf::CHECKIN_CONFIGS, &[])
    }

    /// Insert or replace a check-in config.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_checkin_config(&mut self, config: &CheckinConfig) -> Result<()> {
        self.write(
            cf::CHECKIN_CONFIGS,
            &keys::checkin_config_key(config.id),
            config,
        )
    }

    /// Questions of a config, by position then id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn checkin_questions(
        &mut self,
        config_id: CheckinConfigId,
    ) -> Result<Vec<CheckinQuestion>> {
        let mut questions: Vec<CheckinQuestion> =
            self.scan(cf::CHECKIN_QUESTIONS, &keys::checkin_config_key(config_id))?;
        questions.sort_by_key(|q| (q.position, q.id));
        Ok(questions)
    }

    /// Replace the questions of a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn replace_checkin_questions(
        &mut self,
        config_id: CheckinConfigId,
        questions: &[CheckinQuestion],
    ) -> Result<()> {
        self.delete_prefix(cf::CHECKIN_QUESTIONS, &keys::checkin_config_key(config_id))?;
        for question in questions {
            let key = keys::checkin_question_key(config_id, question.id);
            self.write(cf::CHECKIN_QUESTIONS, &key, question)?;
        }
        Ok(())
    }

    /// Allow-list rows of a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn checkin_distributions(
        &mut self,
        config_id: CheckinConfigId,
    ) -> Result<Vec<CheckinDistribution>> {
        self.scan(
            cf::CHECKIN_DISTRIBUTIONS,
            &keys::checkin_config_key(config_id),
        )
    }

    /// Replace the allow-list of a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn replace_checkin_distributions(
        &mut self,
        config_id: CheckinConfigId,
        distributions: &[CheckinDistribution],
    ) -> Result<()> {
        self.delete_prefix(
            cf::CHECKIN_DISTRIBUTIONS,
            &keys::checkin_config_key(config_id),
        )?;
        for row in distributions {
            let key = keys::distribution_key(config_id, row.target);
            self.write(cf::CHECKIN_DISTRIBUTIONS, &key, row)?;
        }
        Ok(())
    }

    // =========================================================================
    // Group memberships
    // =========================================================================

    /// Group and challenge-group memberships of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a key is malformed.
    pub fn memberships(&mut self, user_id: UserId) -> Result<Memberships> {
        let rows = self
            .inner
            .scan_prefix(cf::GROUP_MEMBERSHIPS, &keys::user_prefix(user_id))?;
        let pairs = rows
            .iter()
            .map(|(key, _)| {
                keys::decode_membership_key(key)
                    .ok_or_else(|| StoreError::Serialization("malformed membership key".into()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Memberships::from_pairs(pairs))
    }

    /// Replace the memberships of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn replace_memberships(
        &mut self,
        user_id: UserId,
        memberships: &[(GroupKind, GroupId)],
    ) -> Result<()> {
        self.delete_prefix(cf::GROUP_MEMBERSHIPS, &keys::user_prefix(user_id))?;
        for (kind, group_id) in memberships {
            let key = keys::membership_key(user_id, *kind, *group_id);
            self.inner.put(cf::GROUP_MEMBERSHIPS, &key, &[])?;
        }
        Ok(())
    }

    // =========================================================================
    // Check-in state
    // =========================================================================

    /// Get the availability row of one instance without locking it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn availability(
        &mut self,
        config_id: CheckinConfigId,
        user_id: UserId,
        week_date: NaiveDate,
    ) -> Result<Option<CheckinAvailability>> {
        self.read(
            cf::CHECKIN_AVAILABILITY,
            &keys::availability_key(config_id, user_id, week_date),
        )
    }

    /// Get the availability row of one instance and lock it until commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the lock times out.
    pub fn availability_for_update(
        &mut self,
        config_id: CheckinConfigId,
        user_id: UserId,
        week_date: NaiveDate,
    ) -> Result<Option<CheckinAvailability>> {
        self.read_for_update(
            cf::CHECKIN_AVAILABILITY,
            &keys::availability_key(config_id, user_id, week_date),
        )
    }

    /// Insert or replace an availability row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_availability(&mut self, row: &CheckinAvailability) -> Result<()> {
        let key = keys::availability_key(row.config_id, row.user_id, row.week_date);
        self.write(cf::CHECKIN_AVAILABILITY, &key, row)
    }

    /// Answers of one user to one config, across all instances.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn checkin_responses(
        &mut self,
        config_id: CheckinConfigId,
        user_id: UserId,
    ) -> Result<Vec<CheckinResponse>> {
        self.scan(
            cf::CHECKIN_RESPONSES,
            &keys::config_user_prefix(config_id, user_id),
        )
    }

    /// Insert or replace the answer to one question for one instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn put_checkin_response(&mut self, response: &CheckinResponse) -> Result<()> {
        let key = keys::response_key(
            response.config_id,
            response.user_id,
            response.week_date,
            response.question_id,
        );
        self.write(cf::CHECKIN_RESPONSES, &key, response)
    }
}
