//! In-memory contract storage.
//!
//! `MemoryStorage` implements both `Storage` and `RangeScan` on top of a
//! `BTreeMap`, so key order is raw byte order. Iterators are snapshots taken
//! at `scan` time and live until `close_iterators` is called.
//!
//! Keys are never empty: a zero-length key marks the end of iteration in the
//! guest record encoding.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::error::HostError;
use crate::storage::{Order, RangeScan, Record, Storage};
use crate::types::MAX_LENGTH_DB_KEY;

/// A snapshot cursor over a fixed record list.
#[derive(Debug, Clone, Default)]
struct SnapshotIter {
    records: Vec<Record>,
    position: usize,
}

impl SnapshotIter {
    fn advance(&mut self) -> Option<Record> {
        let record = self.records.get(self.position).cloned()?;
        self.position += 1;
        Some(record)
    }
}

/// In-memory storage backed by `BTreeMap`.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    iterators: HashMap<u32, SnapshotIter>,
    /// `None` once every `u32` handle has been issued.
    next_iterator_id: Option<u32>,
    max_key_len: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::with_data(BTreeMap::new())
    }

    /// Create a store pre-populated with data. Entries with an empty key
    /// are dropped.
    pub fn with_data(mut data: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        data.remove(b"".as_slice());
        Self {
            data,
            iterators: HashMap::new(),
            next_iterator_id: Some(1),
            max_key_len: MAX_LENGTH_DB_KEY,
        }
    }

    /// Override the key length bound enforced by `set` and `remove`.
    pub fn with_max_key_len(mut self, max_key_len: usize) -> Self {
        self.max_key_len = max_key_len;
        self
    }

    /// Returns the number of entries in the store.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of iterators currently open.
    pub fn open_iterators(&self) -> usize {
        self.iterators.len()
    }

    fn check_key(&self, key: &[u8]) -> Result<(), HostError> {
        if key.len() > self.max_key_len {
            return Err(HostError::KeyTooLong {
                length: key.len(),
                max: self.max_key_len,
            });
        }
        Ok(())
    }

    fn collect_range(&self, start: Option<&[u8]>, end: Option<&[u8]>, order: Order) -> Vec<Record> {
        // BTreeMap::range panics on start > end, so that case is handled here.
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Vec::new();
            }
        }
        let lower = start.map_or(Bound::Unbounded, |s| Bound::Included(s.to_vec()));
        let upper = end.map_or(Bound::Unbounded, |e| Bound::Excluded(e.to_vec()));
        let range = self
            .data
            .range((lower, upper))
            .map(|(k, v)| Record::new(k.clone(), v.clone()));
        match order {
            Order::Ascending => range.collect(),
            Order::Descending => range.rev().collect(),
        }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), HostError> {
        if key.is_empty() {
            return Err(HostError::EmptyKey);
        }
        self.check_key(key)?;
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), HostError> {
        self.check_key(key)?;
        self.data.remove(key);
        Ok(())
    }

    fn as_range_scan(&mut self) -> Option<&mut dyn RangeScan> {
        Some(self)
    }
}

impl RangeScan for MemoryStorage {
    fn scan(
        &mut self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<u32, HostError> {
        let records = self.collect_range(start, end, order);
        let id = self.next_iterator_id.ok_or(HostError::IteratorsExhausted)?;
        self.next_iterator_id = id.checked_add(1);
        self.iterators.insert(id, SnapshotIter { records, position: 0 });
        Ok(id)
    }

    fn next(&mut self, iterator_id: u32) -> Result<Option<Record>, HostError> {
        let iter = self
            .iterators
            .get_mut(&iterator_id)
            .ok_or(HostError::IteratorNotFound(iterator_id))?;
        Ok(iter.advance())
    }

    fn close_iterators(&mut self) {
        self.iterators.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStorage {
        let mut store = MemoryStorage::new();
        for (k, v) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")] {
            store.set(k.as_bytes(), v.as_bytes()).unwrap();
        }
        store
    }

    fn keys(records: &[Record]) -> Vec<&[u8]> {
        records.iter().map(|r| r.key.as_slice()).collect()
    }

    // ── Point operations ─────────────────────────────────────────

    #[test]
    fn test_empty_store() {
        let store = MemoryStorage::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_set_get_remove() {
        let mut store = MemoryStorage::new();
        store.set(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));

        store.set(b"key1", b"v2").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.len(), 1);

        store.remove(b"key1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let mut store = seeded();
        store.remove(b"zzz").unwrap();
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_empty_key_rejected_empty_value_kept() {
        let mut store = MemoryStorage::new();
        assert_eq!(store.set(b"", b"v").unwrap_err(), HostError::EmptyKey);
        store.set(b"empty_val", b"").unwrap();
        assert_eq!(store.get(b"").unwrap(), None);
        assert_eq!(store.get(b"empty_val").unwrap(), Some(vec![]));

        let mut data = BTreeMap::new();
        data.insert(Vec::new(), b"v".to_vec());
        data.insert(b"a".to_vec(), b"1".to_vec());
        let mut store = MemoryStorage::with_data(data);
        let id = store.scan(None, None, Order::Ascending).unwrap();
        assert_eq!(keys(&store.all(id).unwrap()), vec![b"a"]);
    }

    #[test]
    fn test_key_bound() {
        let mut store = MemoryStorage::new();
        let at_limit = vec![7u8; MAX_LENGTH_DB_KEY];
        store.set(&at_limit, b"ok").unwrap();
        assert_eq!(store.get(&at_limit).unwrap(), Some(b"ok".to_vec()));

        let over = vec![7u8; MAX_LENGTH_DB_KEY + 1];
        assert_eq!(
            store.set(&over, b"x").unwrap_err(),
            HostError::KeyTooLong { length: MAX_LENGTH_DB_KEY + 1, max: MAX_LENGTH_DB_KEY }
        );
        assert!(matches!(store.remove(&over), Err(HostError::KeyTooLong { .. })));
    }

    #[test]
    fn test_with_data() {
        let mut data = BTreeMap::new();
        data.insert(b"a".to_vec(), b"1".to_vec());
        data.insert(b"b".to_vec(), b"2".to_vec());
        let store = MemoryStorage::with_data(data);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    // ── Range scans ──────────────────────────────────────────────

    #[test]
    fn test_scan_ascending_full_range() {
        let mut store = seeded();
        let id = store.scan(None, None, Order::Ascending).unwrap();
        let records = store.all(id).unwrap();
        assert_eq!(keys(&records), vec![b"a", b"b", b"c", b"d"]);
        assert_eq!(records[2].value, b"3");
    }

    #[test]
    fn test_scan_descending_is_exact_reverse() {
        let mut store = seeded();
        let asc = store.scan(Some(b"b"), Some(b"d"), Order::Ascending).unwrap();
        let desc = store.scan(Some(b"b"), Some(b"d"), Order::Descending).unwrap();
        let mut asc = store.all(asc).unwrap();
        let desc = store.all(desc).unwrap();
        assert_eq!(keys(&asc), vec![b"b", b"c"]);
        asc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn test_scan_bounds_are_half_open() {
        let mut store = seeded();
        let id = store.scan(Some(b"b"), None, Order::Ascending).unwrap();
        assert_eq!(keys(&store.all(id).unwrap()), vec![b"b", b"c", b"d"]);

        let id = store.scan(None, Some(b"c"), Order::Ascending).unwrap();
        assert_eq!(keys(&store.all(id).unwrap()), vec![b"a", b"b"]);

        let id = store.scan(Some(b"b"), Some(b"b"), Order::Ascending).unwrap();
        assert!(store.all(id).unwrap().is_empty());
    }

    #[test]
    fn test_scan_start_after_end_is_empty() {
        let mut store = seeded();
        let id = store.scan(Some(b"d"), Some(b"a"), Order::Descending).unwrap();
        assert_eq!(store.next(id).unwrap(), None);
    }

    #[test]
    fn test_exhausted_iterator_stays_exhausted() {
        let mut store = seeded();
        let id = store.scan(Some(b"d"), None, Order::Ascending).unwrap();
        assert_eq!(store.next(id).unwrap(), Some(Record::new("d", "4")));
        for _ in 0..3 {
            assert_eq!(store.next(id).unwrap(), None);
        }
    }

    #[test]
    fn test_iterators_are_snapshots() {
        let mut store = seeded();
        let id = store.scan(None, None, Order::Ascending).unwrap();
        store.set(b"aa", b"new").unwrap();
        store.remove(b"c").unwrap();
        assert_eq!(keys(&store.all(id).unwrap()), vec![b"a", b"b", b"c", b"d"]);

        let fresh = store.scan(None, None, Order::Ascending).unwrap();
        assert_eq!(keys(&store.all(fresh).unwrap()), vec![&b"a"[..], b"aa", b"b", b"d"]);
    }

    #[test]
    fn test_interleaved_iterators_are_independent() {
        let mut store = seeded();
        let first = store.scan(None, None, Order::Ascending).unwrap();
        let second = store.scan(None, None, Order::Descending).unwrap();
        assert_eq!(store.next(first).unwrap().unwrap().key, b"a");
        assert_eq!(store.next(second).unwrap().unwrap().key, b"d");
        assert_eq!(store.next(first).unwrap().unwrap().key, b"b");
        assert_eq!(store.next(second).unwrap().unwrap().key, b"c");
    }

    #[test]
    fn test_handles_are_monotonic_across_close() {
        let mut store = seeded();
        let a = store.scan(None, None, Order::Ascending).unwrap();
        let b = store.scan(None, None, Order::Ascending).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.open_iterators(), 2);

        store.close_iterators();
        assert_eq!(store.open_iterators(), 0);
        assert_eq!(store.next(a).unwrap_err(), HostError::IteratorNotFound(a));

        let c = store.scan(None, None, Order::Ascending).unwrap();
        assert_eq!(c, 3);
    }

    #[test]
    fn test_handles_never_wrap() {
        let mut store = seeded();
        store.next_iterator_id = Some(u32::MAX);
        assert_eq!(store.scan(None, None, Order::Ascending).unwrap(), u32::MAX);
        assert_eq!(
            store.scan(None, None, Order::Ascending).unwrap_err(),
            HostError::IteratorsExhausted
        );
        store.close_iterators();
        assert_eq!(
            store.scan(None, None, Order::Ascending).unwrap_err(),
            HostError::IteratorsExhausted
        );
    }

    #[test]
    fn test_unknown_iterator() {
        let mut store = seeded();
        assert_eq!(store.next(42).unwrap_err(), HostError::IteratorNotFound(42));
    }

    #[test]
    fn test_byte_order_not_collation() {
        let mut store = MemoryStorage::new();
        store.set(&[0x80], b"high").unwrap();
        store.set(b"Z", b"upper").unwrap();
        store.set(b"a", b"lower").unwrap();
        let id = store.scan(None, None, Order::Ascending).unwrap();
        let got: Vec<Vec<u8>> = store.all(id).unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(got, vec![b"Z".to_vec(), b"a".to_vec(), vec![0x80]]);
    }

    #[test]
    fn test_range_scan_capability_exposed() {
        let mut store = seeded();
        let scanner = store.as_range_scan().expect("memory storage scans");
        let id = scanner.scan(None, None, Order::Ascending).unwrap();
        assert_eq!(scanner.all(id).unwrap().len(), 4);
    }
}
