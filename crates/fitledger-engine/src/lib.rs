//! Idempotent engagement ledger and aggregation engine for fitledger.
//!
//! The [`Engine`] owns a [`Store`], an [`EngineConfig`] and a
//! [`mockable::Clock`], and exposes the core components as borrowed views:
//!
//! - [`PointsLedger`]: award, revoke, balance, history, reconcile
//! - [`AggregationEngine`]: recompute and read daily totals, range reports
//! - [`CheckinScheduler`]: weekly check-in availability, submission, autosave
//! - [`Diary`]: meal and routine flows composing the three above
//! - [`Admin`]: check-in definitions, exercise metadata, memberships
//!
//! Every operation runs inside one store transaction. An error at any step
//! drops the transaction, so nothing partial is ever committed.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use fitledger_core::{ActionKey, ContextId, UserId};
//! use fitledger_engine::{Engine, EngineConfig};
//! use fitledger_store::MemoryStore;
//!
//! let engine = Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
//! let user_id = UserId::new(7).unwrap();
//! let first = engine
//!     .ledger()
//!     .award(user_id, ActionKey::routine_complete(), ContextId::new("42").unwrap(), 5, None)
//!     .unwrap();
//! assert_eq!(first.points_awarded, 5);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admin;
pub mod aggregation;
pub mod config;
pub mod diary;
pub mod ledger;
pub mod scheduler;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use mockable::{Clock, DefaultClock};

use fitledger_core::Result;
use fitledger_store::{Store, Transaction};

pub use admin::{Admin, CheckinDefinition};
pub use aggregation::AggregationEngine;
pub use config::EngineConfig;
pub use diary::{Diary, MealLogged, NewMeal, RoutineCompleted, RoutineUndone};
pub use ledger::PointsLedger;
pub use scheduler::{AvailableCheckin, CheckinProgress, CheckinScheduler, SubmitOutcome, WeekStatus};

/// The engine: a store, its configuration and a clock.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl Engine {
    /// Create an engine on the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self::with_clock(store, config, Arc::new(DefaultClock))
    }

    /// Create an engine with an explicit clock.
    #[must_use]
    pub fn with_clock(store: Arc<dyn Store>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Name of the storage backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// The current instant.
    ///
    /// "Today" is derived from this and the configured UTC offset on every
    /// call; nothing caches the current week.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    /// The users' calendar day at `now`.
    #[must_use]
    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.config.utc_offset()).date_naive()
    }

    /// The points ledger.
    #[must_use]
    pub const fn ledger(&self) -> PointsLedger<'_> {
        PointsLedger::new(self)
    }

    /// The aggregation engine.
    #[must_use]
    pub const fn aggregation(&self) -> AggregationEngine<'_> {
        AggregationEngine::new(self)
    }

    /// The check-in scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> CheckinScheduler<'_> {
        CheckinScheduler::new(self)
    }

    /// Meal and routine flows.
    #[must_use]
    pub const fn diary(&self) -> Diary<'_> {
        Diary::new(self)
    }

    /// Admin-authored data.
    #[must_use]
    pub const fn admin(&self) -> Admin<'_> {
        Admin::new(self)
    }

    /// Open a store transaction.
    pub(crate) fn begin(&self) -> Result<Transaction<'_>> {
        Ok(Transaction::begin(self.store.as_ref())?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Barrier, Mutex, MutexGuard};
    use std::thread;

    use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone, Utc};
    use fitledger_core::UserId;
    use fitledger_store::MemoryStore;
    use mockable::Clock;

    use crate::{Engine, EngineConfig};

    /// A clock that only moves when a test moves it.
    pub struct MutableClock(Mutex<DateTime<Utc>>);

    impl MutableClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self(Mutex::new(now))
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.lock_clock() = now;
        }

        pub fn advance(&self, delta: TimeDelta) {
            *self.lock_clock() += delta;
        }

        fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
            match self.0.lock() {
                Ok(guard) => guard,
                Err(_) => panic!("clock mutex"),
            }
        }
    }

    impl Clock for MutableClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            *self.lock_clock()
        }
    }

    /// An engine over a fresh memory store, with its clock.
    pub fn engine_at(now: DateTime<Utc>) -> (Engine, Arc<MutableClock>) {
        let clock = Arc::new(MutableClock::new(now));
        let engine = Engine::with_clock(
            Arc::new(MemoryStore::new()),
            EngineConfig::default(),
            clock.clone(),
        );
        (engine, clock)
    }

    /// An engine over a fresh RocksDB store in a temporary directory. The
    /// directory lives as long as the returned guard.
    #[cfg(feature = "rocksdb-backend")]
    pub fn rocks_engine_at(
        now: DateTime<Utc>,
    ) -> (Engine, Arc<MutableClock>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = fitledger_store::RocksStore::open(dir.path()).unwrap();
        let clock = Arc::new(MutableClock::new(now));
        let engine = Engine::with_clock(Arc::new(store), EngineConfig::default(), clock.clone());
        (engine, clock, dir)
    }

    /// Run `op` on `threads` threads at once against one shared engine and
    /// collect the results.
    pub fn race<T, F>(engine: &Arc<Engine>, threads: usize, op: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(&Engine) -> T + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let engine = Arc::clone(engine);
                let op = Arc::clone(&op);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    op(&engine)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    }

    /// Noon UTC on `date` (`YYYY-MM-DD`).
    pub fn noon(date: &str) -> DateTime<Utc> {
        let day = day(date);
        Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
    }

    pub fn day(date: &str) -> NaiveDate {
        fitledger_core::parse_date(date).unwrap()
    }

    pub fn user(id: i64) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn mutable_clock_moves_only_when_told() {
        let start = noon("2024-03-07");
        let clock = MutableClock::new(start);
        assert_eq!(clock.utc(), start);

        clock.advance(TimeDelta::days(1));
        assert_eq!(clock.utc(), start + TimeDelta::days(1));

        clock.set(start);
        assert_eq!(clock.utc(), start);
    }
}
