//! In-memory storage implementation.
//!
//! Transactions hold the store lock from `begin` until commit or drop, so
//! they are fully serialized. Writes are buffered in an overlay and applied
//! on commit; dropping the transaction discards them.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::schema::all_column_families;
use crate::{KvPair, KvTransaction, Store};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;
type Tables = HashMap<&'static str, Table>;

/// Pending writes of one column family; `None` marks a delete.
type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Memory-backed storage. Contents are lost when the store is dropped.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store with every column family.
    #[must_use]
    pub fn new() -> Self {
        let tables = all_column_families()
            .into_iter()
            .map(|name| (name, Table::new()))
            .collect();
        Self {
            tables: Mutex::new(tables),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn begin(&self) -> Result<Box<dyn KvTransaction + '_>> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))?;
        Ok(Box::new(MemoryTransaction {
            tables,
            writes: HashMap::new(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction<'a> {
    tables: MutexGuard<'a, Tables>,
    writes: HashMap<String, Overlay>,
}

impl MemoryTransaction<'_> {
    fn table(&self, cf: &str) -> Result<&Table> {
        self.tables
            .get(cf)
            .ok_or_else(|| StoreError::Corrupted(format!("column family not found: {cf}")))
    }

    fn overlay(&mut self, cf: &str) -> Result<&mut Overlay> {
        self.table(cf)?;
        Ok(self.writes.entry(cf.to_string()).or_default())
    }
}

impl KvTransaction for MemoryTransaction<'_> {
    fn get(&mut self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(cf).and_then(|overlay| overlay.get(key)) {
            return Ok(pending.clone());
        }
        Ok(self.table(cf)?.get(key).cloned())
    }

    fn get_for_update(&mut self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // The whole store is already locked by this transaction.
        self.get(cf, key)
    }

    fn put(&mut self, cf: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.overlay(cf)?.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, cf: &str, key: &[u8]) -> Result<()> {
        self.overlay(cf)?.insert(key.to_vec(), None);
        Ok(())
    }

    fn scan_range(&mut self, cf: &str, start: &[u8], end: Option<&[u8]>) -> Result<Vec<KvPair>> {
        if end.is_some_and(|end| start > end) {
            return Ok(Vec::new());
        }
        let range = (
            Bound::Included(start),
            end.map_or(Bound::Unbounded, Bound::Excluded),
        );

        let mut merged: Table = self
            .table(cf)?
            .range::<[u8], _>(range)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(overlay) = self.writes.get(cf) {
            for (key, pending) in overlay.range::<[u8], _>(range) {
                match pending {
                    Some(value) => merged.insert(key.clone(), value.clone()),
                    None => merged.remove(key),
                };
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let Self { mut tables, writes } = *self;
        for (cf, overlay) in writes {
            let table = tables
                .get_mut(cf.as_str())
                .ok_or_else(|| StoreError::Corrupted(format!("column family not found: {cf}")))?;
            for (key, pending) in overlay {
                match pending {
                    Some(value) => table.insert(key, value),
                    None => table.remove(&key),
                };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::cf;

    #[test]
    fn reads_observe_own_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.put(cf::USER_POINTS, b"a", b"1").unwrap();
        assert_eq!(tx.get(cf::USER_POINTS, b"a").unwrap(), Some(b"1".to_vec()));
        tx.delete(cf::USER_POINTS, b"a").unwrap();
        assert_eq!(tx.get(cf::USER_POINTS, b"a").unwrap(), None);
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().unwrap();
            tx.put(cf::LEDGER, b"k", b"v").unwrap();
        }
        let mut tx = store.begin().unwrap();
        assert_eq!(tx.get(cf::LEDGER, b"k").unwrap(), None);
    }

    #[test]
    fn commit_applies_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.put(cf::LEDGER, b"k", b"v").unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        assert_eq!(tx.get(cf::LEDGER, b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn scan_merges_committed_and_pending() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        tx.put(cf::MEAL_LOGS, &[1, 1], b"a").unwrap();
        tx.put(cf::MEAL_LOGS, &[1, 2], b"b").unwrap();
        tx.put(cf::MEAL_LOGS, &[2, 1], b"c").unwrap();
        tx.commit().unwrap();

        let mut tx = store.begin().unwrap();
        tx.delete(cf::MEAL_LOGS, &[1, 1]).unwrap();
        tx.put(cf::MEAL_LOGS, &[1, 3], b"d").unwrap();

        let rows = tx.scan_prefix(cf::MEAL_LOGS, &[1]).unwrap();
        assert_eq!(
            rows,
            vec![(vec![1, 2], b"b".to_vec()), (vec![1, 3], b"d".to_vec())]
        );
    }

    #[test]
    fn unknown_column_family_is_an_error() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        assert!(matches!(
            tx.put("nope", b"k", b"v"),
            Err(StoreError::Corrupted(_))
        ));
    }
}
