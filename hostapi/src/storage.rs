//! Contract storage abstraction for the cwvm host.
//!
//! `Storage` is the point-operation capability every backend provides.
//! Range scans are a separate capability, [`RangeScan`], that a backend may
//! expose through [`Storage::as_range_scan`]. The import layer asks for it
//! only when the guest calls `db_scan`/`db_next`.
//!
//! Implementations:
//! - `MemoryStorage` (this crate) — in-memory BTreeMap with snapshot iterators

use std::cmp::Ordering;

use crate::error::HostError;

/// One key-value pair produced by an iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Iteration order of a range scan. The repr values are the ABI encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Order {
    Ascending = 1,
    Descending = 2,
}

impl TryFrom<u32> for Order {
    type Error = HostError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Ascending),
            2 => Ok(Self::Descending),
            other => Err(HostError::InvalidOrder(other)),
        }
    }
}

impl From<Order> for u32 {
    fn from(order: Order) -> u32 {
        order as u32
    }
}

/// Compare two byte strings as unsigned, lexicographic sequences.
///
/// A proper prefix sorts before the longer string.
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Point operations over contract storage.
///
/// Implementations must be deterministic and keep keys unique.
pub trait Storage: Send {
    /// Get the value for a key. Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, HostError>;

    /// Insert or overwrite a value. Fails with `EmptyKey` for a zero-length
    /// key and `KeyTooLong` above the backend's key bound.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), HostError>;

    /// Remove a key. Removing an absent key is a no-op.
    fn remove(&mut self, key: &[u8]) -> Result<(), HostError>;

    /// Expose the range-scan capability, if this backend has one.
    fn as_range_scan(&mut self) -> Option<&mut dyn RangeScan> {
        None
    }
}

/// Ordered, multi-cursor range scans.
///
/// Each `scan` call snapshots the matching records, so later writes never
/// change an open iterator's result set.
pub trait RangeScan {
    /// Open an iterator over `start <= key < end` and return its handle.
    ///
    /// `None` bounds are unbounded. `start > end` yields an empty iterator.
    /// Handles start at 1 and are never reused.
    fn scan(
        &mut self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        order: Order,
    ) -> Result<u32, HostError>;

    /// Advance an iterator. Returns `Ok(None)` once exhausted, forever after.
    fn next(&mut self, iterator_id: u32) -> Result<Option<Record>, HostError>;

    /// Drop every open iterator. Handle numbering continues where it left off.
    fn close_iterators(&mut self);

    /// Drain an iterator into a vector.
    fn all(&mut self, iterator_id: u32) -> Result<Vec<Record>, HostError> {
        let mut out = Vec::new();
        while let Some(record) = self.next(iterator_id)? {
            out.push(record);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_from_abi_value() {
        assert_eq!(Order::try_from(1).unwrap(), Order::Ascending);
        assert_eq!(Order::try_from(2).unwrap(), Order::Descending);
        assert_eq!(Order::try_from(0).unwrap_err(), HostError::InvalidOrder(0));
        assert_eq!(Order::try_from(3).unwrap_err(), HostError::InvalidOrder(3));
        assert_eq!(u32::from(Order::Descending), 2);
    }

    #[test]
    fn test_compare_keys_is_unsigned_bytewise() {
        assert_eq!(compare_keys(b"a", b"b"), Ordering::Less);
        assert_eq!(compare_keys(b"ab", b"a"), Ordering::Greater);
        assert_eq!(compare_keys(&[0x7f], &[0x80]), Ordering::Less);
        assert_eq!(compare_keys(b"", b""), Ordering::Equal);
        // "Z" (0x5a) sorts before "a" (0x61), unlike a case-folding collation.
        assert_eq!(compare_keys(b"Z", b"a"), Ordering::Less);
    }
}
