//! Transactional storage layer for fitledger.
//!
//! This crate persists the points ledger, diary events, tracking cache and
//! check-in state as ordered key-value column families with CBOR values.
//!
//! # Architecture
//!
//! - [`Store`]: a backend that can open transactions.
//! - [`KvTransaction`]: raw reads, locking reads, writes and ordered scans
//!   inside one transaction. Dropping it without `commit` rolls back.
//! - [`Transaction`]: typed table accessors over a `KvTransaction`. Every
//!   engine operation runs inside exactly one of these.
//!
//! Two backends ship with the crate: [`MemoryStore`], which serializes
//! transactions behind a single lock, and `RocksStore` (feature
//! `rocksdb-backend`), built on a RocksDB `TransactionDB` with row locks.
//!
//! # Example
//!
//! ```
//! use fitledger_core::UserId;
//! use fitledger_store::{MemoryStore, Transaction};
//!
//! let store = MemoryStore::new();
//! let user_id = UserId::new(1).unwrap();
//!
//! let mut tx = Transaction::begin(&store).unwrap();
//! assert!(tx.user_points(user_id).unwrap().is_none());
//! tx.commit().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;
pub mod transaction;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;
pub use transaction::{HistoryPage, Transaction};

/// A raw key-value pair returned by scans.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// The storage trait implemented by every backend.
pub trait Store: Send + Sync {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start a transaction.
    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Raw operations inside one transaction.
///
/// Reads observe the transaction's own uncommitted writes.
pub trait KvTransaction {
    /// Read a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get(&mut self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Read a key and lock it until the transaction ends.
    ///
    /// Two transactions that lock the same key are serialized, which is what
    /// makes check-then-insert on a uniqueness key safe.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Busy` if the lock cannot be acquired in time.
    fn get_for_update(&mut self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put(&mut self, cf: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete(&mut self, cf: &str, key: &[u8]) -> Result<()>;

    /// Keys in `start..end` (or `start..` when `end` is `None`) in ascending
    /// byte order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn scan_range(&mut self, cf: &str, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>>;

    /// Keys starting with `prefix` in ascending byte order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn scan_prefix(&mut self, cf: &str, prefix: &[u8]) -> Result<Vec<KvPair>> {
        let end = keys::prefix_end(prefix);
        self.scan_range(cf, prefix, end.as_deref())
    }

    /// Make every write of this transaction durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing was applied in that case.
    fn commit(self: Box<Self>) -> Result<()>;
}
