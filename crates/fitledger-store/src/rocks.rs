//! `RocksDB` storage implementation.
//!
//! Uses a pessimistic `TransactionDB`: `get_for_update` takes a row lock held
//! until the transaction commits or is dropped, and a commit applies all of
//! the transaction's writes atomically.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    Options, Transaction as RocksTxn, TransactionDB, TransactionDBOptions,
};

use crate::error::{Result, StoreError};
use crate::schema::{all_column_families, ensure_version};
use crate::{KvPair, KvTransaction, Store};

type Db = TransactionDB<MultiThreaded>;

/// Milliseconds a transaction waits for a row lock before giving up.
const LOCK_TIMEOUT_MS: i64 = 2_000;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created, or if it
    /// was written by an incompatible schema version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_default_lock_timeout(LOCK_TIMEOUT_MS);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, &txn_opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { db: Arc::new(db) };
        ensure_version(&store)?;
        Ok(store)
    }
}

impl Store for RocksStore {
    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>> {
        Ok(Box::new(RocksTransaction {
            db: &self.db,
            txn: self.db.transaction(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "rocksdb"
    }
}

struct RocksTransaction<'a> {
    db: &'a Db,
    txn: RocksTxn<'a, Db>,
}

impl RocksTransaction<'_> {
    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Corrupted(format!("column family not found: {name}")))
    }
}

/// Lock timeouts and write conflicts are transient; everything else is a
/// database failure.
fn db_err(err: &rocksdb::Error) -> StoreError {
    match err.kind() {
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain => {
            StoreError::Busy(err.to_string())
        }
        _ => StoreError::Database(err.to_string()),
    }
}

impl KvTransaction for RocksTransaction<'_> {
    fn get(&mut self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.cf(cf)?;
        self.txn.get_cf(&handle, key).map_err(|e| db_err(&e))
    }

    fn get_for_update(&mut self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let handle = self.cf(cf)?;
        self.txn
            .get_for_update_cf(&handle, key, true)
            .map_err(|e| db_err(&e))
    }

    fn put(&mut self, cf: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let handle = self.cf(cf)?;
        self.txn.put_cf(&handle, key, value).map_err(|e| db_err(&e))
    }

    fn delete(&mut self, cf: &str, key: &[u8]) -> Result<()> {
        let handle = self.cf(cf)?;
        self.txn.delete_cf(&handle, key).map_err(|e| db_err(&e))
    }

    fn scan_range(&mut self, cf: &str, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>> {
        let handle = self.cf(cf)?;
        let iter = self
            .txn
            .iterator_cf(&handle, IteratorMode::From(start, Direction::Forward));

        let mut rows = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| db_err(&e))?;
            if end.is_some_and(|end| key.as_ref() >= end) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.txn.commit().map_err(|e| db_err(&e))
    }
}
