//! Database schema definitions and column families.
//!
//! Every backend stores the same column families with the same key layout
//! (see [`keys`](crate::keys)) and CBOR-encoded values.

use crate::error::{Result, StoreError};
use crate::{codec, Store};

/// Layout version written to [`cf::META`] on first open.
pub const SCHEMA_VERSION: u32 = 1;

/// Key of the schema version inside [`cf::META`].
pub const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Column family names.
pub mod cf {
    /// Store metadata (schema version).
    pub const META: &str = "meta";

    /// Points ledger, keyed by `user_id || action_key 0 || context_id 0 || date`.
    pub const LEDGER: &str = "ledger";

    /// Index: ledger entries by user and award time,
    /// keyed by `user_id || awarded_at || ledger key suffix`. Value is empty.
    pub const LEDGER_BY_USER: &str = "ledger_by_user";

    /// Denormalized points balance, keyed by `user_id`.
    pub const USER_POINTS: &str = "user_points";

    /// Meal diary rows, keyed by `user_id || date || meal_log_id`.
    pub const MEAL_LOGS: &str = "meal_logs";

    /// Routine completions, keyed by `user_id || date || routine_item_id`.
    pub const ROUTINE_LOGS: &str = "routine_logs";

    /// Exercise metadata, keyed by `routine_item_id`.
    pub const ROUTINE_ITEMS: &str = "routine_items";

    /// Cached daily totals, keyed by `user_id || date`.
    pub const DAILY_TRACKING: &str = "daily_tracking";

    /// Check-in configurations, keyed by `config_id`.
    pub const CHECKIN_CONFIGS: &str = "checkin_configs";

    /// Check-in questions, keyed by `config_id || question_id`.
    pub const CHECKIN_QUESTIONS: &str = "checkin_questions";

    /// Check-in allow-list, keyed by `config_id || target kind || target_id`.
    pub const CHECKIN_DISTRIBUTIONS: &str = "checkin_distributions";

    /// Group memberships, keyed by `user_id || group kind || group_id`.
    /// Value is empty.
    pub const GROUP_MEMBERSHIPS: &str = "group_memberships";

    /// Weekly check-in state, keyed by `config_id || user_id || week_date`.
    pub const CHECKIN_AVAILABILITY: &str = "checkin_availability";

    /// Check-in answers, keyed by `config_id || user_id || week_date || question_id`.
    pub const CHECKIN_RESPONSES: &str = "checkin_responses";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::META,
        cf::LEDGER,
        cf::LEDGER_BY_USER,
        cf::USER_POINTS,
        cf::MEAL_LOGS,
        cf::ROUTINE_LOGS,
        cf::ROUTINE_ITEMS,
        cf::DAILY_TRACKING,
        cf::CHECKIN_CONFIGS,
        cf::CHECKIN_QUESTIONS,
        cf::CHECKIN_DISTRIBUTIONS,
        cf::GROUP_MEMBERSHIPS,
        cf::CHECKIN_AVAILABILITY,
        cf::CHECKIN_RESPONSES,
    ]
}

/// Check or initialize the schema version of a freshly opened store.
///
/// # Errors
///
/// Returns `StoreError::SchemaVersion` if the store was written by another
/// layout version.
pub fn ensure_version(store: &dyn Store) -> Result<()> {
    let mut tx = store.begin()?;
    match tx.get_for_update(cf::META, SCHEMA_VERSION_KEY)? {
        Some(bytes) => {
            let found: u32 = codec::deserialize(&bytes)?;
            if found != SCHEMA_VERSION {
                return Err(StoreError::SchemaVersion {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
            tracing::debug!(version = found, "Store schema version ok");
        }
        None => {
            tx.put(cf::META, SCHEMA_VERSION_KEY, &codec::serialize(&SCHEMA_VERSION)?)?;
            tracing::info!(
                version = SCHEMA_VERSION,
                backend = store.backend_name(),
                "Initialized store schema"
            );
        }
    }
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn version_written_once_then_checked() {
        let store = MemoryStore::new();
        ensure_version(&store).unwrap();
        ensure_version(&store).unwrap();
    }

    #[test]
    fn mismatched_version_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.put(cf::META, SCHEMA_VERSION_KEY, &codec::serialize(&99u32).unwrap())
            .unwrap();
        tx.commit().unwrap();

        let err = ensure_version(&store).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaVersion {
                found: 99,
                expected: SCHEMA_VERSION
            }
        ));
    }
}
