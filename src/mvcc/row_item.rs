//! RowItem - the versioned, comparable unit of storage
//!
//! Items order by table id, then by each leading key column under SQL
//! ordering (reversed where the column's bit is set in the reverse
//! mask). Version and tombstone state are not part of the order: two
//! items with the same key are the same tree slot.
//!
//! An item without a row is a lower-bound sentinel for its table and
//! sorts before every real row of that table. An item whose row holds
//! fewer key columns than another sorts before every row it prefixes,
//! which is how key-prefix seeks are expressed.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::mvcc::CommitId;
use crate::types::{TableDef, Value};

#[derive(Debug, Clone)]
pub struct RowItem {
    pub table_id: u32,
    /// `CommitId::PENDING` until the commit step stamps it.
    pub version: CommitId,
    /// Bit i set when key column i sorts descending.
    pub reverse_mask: u64,
    /// Number of leading key columns in `row`.
    pub key_count: usize,
    pub tombstone: bool,
    /// Stored-order row; tombstones carry only the key columns.
    pub row: Option<Arc<[Value]>>,
}

impl RowItem {
    /// A pending live row in stored column order.
    pub fn pending(def: &TableDef, stored: Vec<Value>) -> Self {
        Self {
            table_id: def.table_id(),
            version: CommitId::PENDING,
            reverse_mask: def.reverse_mask(),
            key_count: def.key_count(),
            tombstone: false,
            row: Some(stored.into()),
        }
    }

    /// A probe for `key`, which may be a leading prefix of the key columns.
    pub fn probe(def: &TableDef, key: Vec<Value>) -> Self {
        Self {
            table_id: def.table_id(),
            version: CommitId::PENDING,
            reverse_mask: def.reverse_mask(),
            key_count: key.len(),
            tombstone: false,
            row: Some(key.into()),
        }
    }

    /// Lower-bound sentinel for a table.
    pub fn sentinel(table_id: u32) -> Self {
        Self {
            table_id,
            version: CommitId::PENDING,
            reverse_mask: 0,
            key_count: 0,
            tombstone: false,
            row: None,
        }
    }

    /// A pending tombstone for this item's key.
    pub fn to_tombstone(&self) -> Self {
        Self {
            table_id: self.table_id,
            version: CommitId::PENDING,
            reverse_mask: self.reverse_mask,
            key_count: self.key_count,
            tombstone: true,
            row: Some(self.key().to_vec().into()),
        }
    }

    /// The leading key columns, empty for a sentinel.
    pub fn key(&self) -> &[Value] {
        match &self.row {
            Some(row) => &row[..self.key_count.min(row.len())],
            None => &[],
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.row.is_none()
    }

    fn is_reversed(&self, column: usize) -> bool {
        column < 64 && (self.reverse_mask >> column) & 1 == 1
    }

    /// Compares the leading `prefix.len()` key columns against `prefix`.
    ///
    /// `Equal` means this item's key starts with `prefix`.
    pub fn cmp_key_prefix(&self, prefix: &[Value]) -> Ordering {
        let key = self.key();
        for (i, bound) in prefix.iter().enumerate() {
            let Some(value) = key.get(i) else {
                return Ordering::Less;
            };
            let mut ord = value.sql_cmp(bound);
            if self.is_reversed(i) {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for RowItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RowItem {}

impl PartialOrd for RowItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.table_id
            .cmp(&other.table_id)
            .then_with(|| match (&self.row, &other.row) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(_), Some(_)) => {
                    let ord = self.cmp_key_prefix(other.key());
                    if ord != Ordering::Equal {
                        return ord;
                    }
                    self.key().len().cmp(&other.key().len())
                }
            })
    }
}
