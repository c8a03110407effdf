//! Byte-keyed ordered transactional engines
//!
//! The capability set the row layer needs from an underlying store:
//! begin, get, set, delete, ordered range and prefix scans, commit,
//! rollback. `MemoryKv` is the in-process implementation; `KvTable`
//! maps table rows onto any `KvTxn` with the order-preserving key codec.

mod memory;
mod table;

use std::ops::Bound;

use thiserror::Error;

use crate::types::TableDefError;
use crate::wal::Severity;

pub use memory::{MemoryKv, MemoryTxn};
pub use table::KvTable;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("transaction is no longer active")]
    Closed,

    #[error("duplicate primary key in table {table}")]
    DuplicateKey { table: String },

    #[error("corrupt stored row: {0}")]
    Corruption(String),

    #[error(transparent)]
    Schema(#[from] TableDefError),
}

impl KvError {
    pub fn code(&self) -> &'static str {
        match self {
            KvError::Closed => "RELKV_TXN_CLOSED",
            KvError::DuplicateKey { .. } => "RELKV_DUPLICATE_KEY",
            KvError::Corruption(_) => "RELKV_CORRUPTION",
            KvError::Schema(_) => "RELKV_SCHEMA",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            KvError::Corruption(_) => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

pub type KvResult<T> = Result<T, KvError>;

/// Key/value pairs in ascending key order.
pub type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// An engine that hands out transactions.
pub trait KvEngine {
    type Txn: KvTxn;

    fn begin(&self) -> KvResult<Self::Txn>;
}

/// One transaction over an ordered byte-keyed map.
///
/// Reads observe the transaction's own writes.
pub trait KvTxn {
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()>;

    fn delete(&mut self, key: &[u8]) -> KvResult<()>;

    /// Pairs with keys inside the given bounds, in ascending key order.
    fn scan_range(&self, start: Bound<&[u8]>, end: Bound<&[u8]>) -> KvResult<KvPairs>;

    /// Pairs at or after `start`, at most `limit` of them.
    fn seek(&self, start: &[u8], limit: usize) -> KvResult<KvPairs> {
        let mut pairs = self.scan_range(Bound::Included(start), Bound::Unbounded)?;
        pairs.truncate(limit);
        Ok(pairs)
    }

    /// Pairs whose key begins with `prefix`.
    fn scan_prefix(&self, prefix: &[u8]) -> KvResult<KvPairs> {
        match prefix_end(prefix) {
            Some(end) => self.scan_range(Bound::Included(prefix), Bound::Excluded(&end)),
            None => self.scan_range(Bound::Included(prefix), Bound::Unbounded),
        }
    }

    fn commit(self) -> KvResult<()>;

    fn rollback(self);
}

/// Smallest key greater than every key beginning with `prefix`, or `None`
/// when no such key exists (empty or all-0xFF prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_end(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_end(&[]), None);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(KvError::Closed.code(), "RELKV_TXN_CLOSED");
        assert_eq!(KvError::Corruption("x".into()).severity(), Severity::Fatal);
        assert_eq!(
            KvError::DuplicateKey { table: "t".into() }.severity(),
            Severity::Error
        );
    }
}
