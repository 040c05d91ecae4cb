//! Key encoding utilities.
//!
//! Keys are concatenations of fixed-width big-endian fields so that byte
//! order matches logical order: a prefix scan over `user_id || date` yields a
//! user's rows in date order. Variable-width string fields (action key,
//! context id) are terminated by a NUL byte, which validation forbids inside
//! them.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use fitledger_core::{
    CheckinConfigId, DistributionTarget, GroupId, GroupKind, LedgerKey, MealLogId,
    PointsLedgerEntry, QuestionId, RoutineItemId, UserId,
};

const SIGN_FLIP_32: u32 = 0x8000_0000;
const SIGN_FLIP_64: u64 = 0x8000_0000_0000_0000;

// ============================================================================
// Field encoders
// ============================================================================

/// Encode a date as 4 order-preserving bytes.
#[must_use]
pub fn encode_date(date: NaiveDate) -> [u8; 4] {
    let days = u32::from_be_bytes(date.num_days_from_ce().to_be_bytes());
    (days ^ SIGN_FLIP_32).to_be_bytes()
}

/// Decode a date written by [`encode_date`].
#[must_use]
pub fn decode_date(bytes: &[u8]) -> Option<NaiveDate> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    let days = i32::from_be_bytes((u32::from_be_bytes(raw) ^ SIGN_FLIP_32).to_be_bytes());
    NaiveDate::from_num_days_from_ce_opt(days)
}

/// Encode a timestamp (microseconds) as 8 order-preserving bytes.
#[must_use]
pub fn encode_timestamp(at: DateTime<Utc>) -> [u8; 8] {
    let micros = u64::from_be_bytes(at.timestamp_micros().to_be_bytes());
    (micros ^ SIGN_FLIP_64).to_be_bytes()
}

/// The smallest key greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (the prefix is all `0xFF`).
#[must_use]
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

// ============================================================================
// Points ledger
// ============================================================================

/// Key prefix of everything a user owns in a user-keyed table.
#[must_use]
pub fn user_prefix(user_id: UserId) -> Vec<u8> {
    user_id.to_be_bytes().to_vec()
}

/// Ledger key: `user_id || action_key 0 || context_id 0 || date`.
#[must_use]
pub fn ledger_key(key: &LedgerKey) -> Vec<u8> {
    concat(&[
        &key.user_id.to_be_bytes(),
        key.action_key.as_str().as_bytes(),
        &[0],
        key.context_id.as_str().as_bytes(),
        &[0],
        &encode_date(key.date),
    ])
}

/// History index key: `user_id || awarded_at || ledger key without user`.
///
/// Since timestamps are order-preserving, a user's entries sort by award time.
#[must_use]
pub fn ledger_index_key(entry: &PointsLedgerEntry) -> Vec<u8> {
    let ledger = ledger_key(&entry.key());
    concat(&[
        &entry.user_id.to_be_bytes(),
        &encode_timestamp(entry.awarded_at),
        &ledger[8..],
    ])
}

/// Recover the ledger key from a history index key.
#[must_use]
pub fn ledger_key_from_index(index_key: &[u8]) -> Option<Vec<u8>> {
    if index_key.len() <= 16 {
        return None;
    }
    Some(concat(&[&index_key[..8], &index_key[16..]]))
}

// ============================================================================
// Daily events and tracking
// ============================================================================

/// Key of a user's day: `user_id || date`. Also the prefix of that day's
/// meal and routine rows.
#[must_use]
pub fn user_date_key(user_id: UserId, date: NaiveDate) -> Vec<u8> {
    concat(&[&user_id.to_be_bytes(), &encode_date(date)])
}

/// Scan bounds covering a user's days `start..=end`: inclusive start key and
/// exclusive end key.
#[must_use]
pub fn user_date_bounds(
    user_id: UserId,
    start: NaiveDate,
    end: NaiveDate,
) -> (Vec<u8>, Option<Vec<u8>>) {
    (
        user_date_key(user_id, start),
        prefix_end(&user_date_key(user_id, end)),
    )
}

/// Meal diary key: `user_id || date || meal_log_id`.
#[must_use]
pub fn meal_log_key(user_id: UserId, date: NaiveDate, id: MealLogId) -> Vec<u8> {
    concat(&[&user_date_key(user_id, date), &id.to_bytes()])
}

/// Routine completion key: `user_id || date || routine_item_id`.
#[must_use]
pub fn routine_log_key(user_id: UserId, date: NaiveDate, item_id: RoutineItemId) -> Vec<u8> {
    concat(&[&user_date_key(user_id, date), &item_id.to_be_bytes()])
}

/// Routine item key.
#[must_use]
pub fn routine_item_key(item_id: RoutineItemId) -> Vec<u8> {
    item_id.to_be_bytes().to_vec()
}

// ============================================================================
// Check-ins
// ============================================================================

/// Check-in config key. Also the prefix of the config's questions and
/// distribution rows.
#[must_use]
pub fn checkin_config_key(config_id: CheckinConfigId) -> Vec<u8> {
    config_id.to_be_bytes().to_vec()
}

/// Question key: `config_id || question_id`.
#[must_use]
pub fn checkin_question_key(config_id: CheckinConfigId, question_id: QuestionId) -> Vec<u8> {
    concat(&[&config_id.to_be_bytes(), &question_id.to_be_bytes()])
}

/// Distribution key: `config_id || target kind || target_id`.
#[must_use]
pub fn distribution_key(config_id: CheckinConfigId, target: DistributionTarget) -> Vec<u8> {
    let (kind, id) = match target {
        DistributionTarget::User(user) => (0u8, user.to_be_bytes()),
        DistributionTarget::Group(group) => (1, group.to_be_bytes()),
        DistributionTarget::ChallengeGroup(group) => (2, group.to_be_bytes()),
    };
    concat(&[&config_id.to_be_bytes(), &[kind], &id])
}

const fn group_kind_byte(kind: GroupKind) -> u8 {
    match kind {
        GroupKind::Group => 0,
        GroupKind::ChallengeGroup => 1,
    }
}

/// Membership key: `user_id || group kind || group_id`.
#[must_use]
pub fn membership_key(user_id: UserId, kind: GroupKind, group_id: GroupId) -> Vec<u8> {
    concat(&[
        &user_id.to_be_bytes(),
        &[group_kind_byte(kind)],
        &group_id.to_be_bytes(),
    ])
}

/// Decode the group part of a membership key.
#[must_use]
pub fn decode_membership_key(key: &[u8]) -> Option<(GroupKind, GroupId)> {
    if key.len() != 17 {
        return None;
    }
    let kind = match key[8] {
        0 => GroupKind::Group,
        1 => GroupKind::ChallengeGroup,
        _ => return None,
    };
    let raw: [u8; 8] = key[9..17].try_into().ok()?;
    let group = GroupId::new(i64::from_be_bytes(raw)).ok()?;
    Some((kind, group))
}

/// Key prefix of one user's rows for one config.
#[must_use]
pub fn config_user_prefix(config_id: CheckinConfigId, user_id: UserId) -> Vec<u8> {
    concat(&[&config_id.to_be_bytes(), &user_id.to_be_bytes()])
}

/// Availability key: `config_id || user_id || week_date`.
#[must_use]
pub fn availability_key(
    config_id: CheckinConfigId,
    user_id: UserId,
    week_date: NaiveDate,
) -> Vec<u8> {
    concat(&[
        &config_user_prefix(config_id, user_id),
        &encode_date(week_date),
    ])
}

/// Response key: `config_id || user_id || week_date || question_id`.
#[must_use]
pub fn response_key(
    config_id: CheckinConfigId,
    user_id: UserId,
    week_date: NaiveDate,
    question_id: QuestionId,
) -> Vec<u8> {
    concat(&[
        &availability_key(config_id, user_id, week_date),
        &question_id.to_be_bytes(),
    ])
}
