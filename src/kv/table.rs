//! Row adapter over a byte-keyed transaction
//!
//! Key:   4-byte big-endian table id || `make_key` of the key columns
//! Value: `encode_row_value` of the non-key columns in stored order
//!
//! The key encoding is order-preserving and prefix-free per column, so a
//! key-prefix range maps onto one contiguous byte range.

use std::ops::Bound;

use crate::codec::{decode_row_value_with_width, encode_row_value, make_key, parse_key};
use crate::mvcc::KeyRange;
use crate::types::{TableDef, Value};

use super::{prefix_end, KvError, KvResult, KvTxn};

/// Table rows stored in a `KvTxn`.
#[derive(Debug, Clone, Copy)]
pub struct KvTable<'a> {
    def: &'a TableDef,
}

impl<'a> KvTable<'a> {
    pub fn new(def: &'a TableDef) -> Self {
        Self { def }
    }

    fn table_prefix(&self) -> [u8; 4] {
        self.def.table_id().to_be_bytes()
    }

    /// Encoded key for a (possibly partial) primary-key prefix.
    pub fn encode_key(&self, key: &[Value]) -> Vec<u8> {
        let mut buf = self.table_prefix().to_vec();
        let keys = &self.def.stored_keys()[..key.len().min(self.def.key_count())];
        buf.extend_from_slice(&make_key(key, keys));
        buf
    }

    fn encode_value(&self, stored: &[Value]) -> Vec<u8> {
        let rest = &stored[self.def.key_count()..];
        encode_row_value(rest, rest.len())
    }

    /// Rebuilds a declaration-order row from a stored pair.
    fn decode(&self, key: &[u8], value: &[u8]) -> KvResult<Vec<Value>> {
        let k = self.def.key_count();
        let mut stored = vec![Value::Null; self.def.width()];
        let (prefix, key_bytes) = key.split_at(key.len().min(4));
        if prefix != self.table_prefix().as_slice()
            || !parse_key(key_bytes, self.def.stored_keys(), &mut stored[..k])
        {
            return Err(KvError::Corruption(format!(
                "table {}: malformed key",
                self.def.name()
            )));
        }
        let width = self.def.width() - k;
        let rest = decode_row_value_with_width(value, width).ok_or_else(|| {
            KvError::Corruption(format!(
                "table {}: malformed row value (expected {} columns)",
                self.def.name(),
                width
            ))
        })?;
        for (slot, value) in stored[k..].iter_mut().zip(rest) {
            *slot = value;
        }
        Ok(self.def.to_user(&stored))
    }

    pub fn get<T: KvTxn>(&self, txn: &T, key: &[Value]) -> KvResult<Option<Vec<Value>>> {
        self.def.check_key(key)?;
        let encoded = self.encode_key(key);
        match txn.get(&encoded)? {
            Some(value) => self.decode(&encoded, &value).map(Some),
            None => Ok(None),
        }
    }

    pub fn insert<T: KvTxn>(&self, txn: &mut T, row: &[Value]) -> KvResult<()> {
        self.def.check_row(row)?;
        let stored = self.def.to_stored(row);
        let key = self.encode_key(&stored[..self.def.key_count()]);
        if txn.get(&key)?.is_some() {
            return Err(KvError::DuplicateKey {
                table: self.def.name().to_string(),
            });
        }
        txn.set(&key, &self.encode_value(&stored))
    }

    /// Replaces the row with the same primary key; false when absent.
    pub fn update<T: KvTxn>(&self, txn: &mut T, row: &[Value]) -> KvResult<bool> {
        self.def.check_row(row)?;
        let stored = self.def.to_stored(row);
        let key = self.encode_key(&stored[..self.def.key_count()]);
        if txn.get(&key)?.is_none() {
            return Ok(false);
        }
        txn.set(&key, &self.encode_value(&stored))?;
        Ok(true)
    }

    pub fn delete<T: KvTxn>(&self, txn: &mut T, key: &[Value]) -> KvResult<bool> {
        self.def.check_key(key)?;
        let encoded = self.encode_key(key);
        if txn.get(&encoded)?.is_none() {
            return Ok(false);
        }
        txn.delete(&encoded)?;
        Ok(true)
    }

    /// Rows in `range`, in key order.
    pub fn scan<T: KvTxn>(&self, txn: &T, range: &KeyRange) -> KvResult<Vec<Vec<Value>>> {
        let table_end = prefix_end(&self.table_prefix());
        let start: Bound<Vec<u8>> = match &range.start {
            Bound::Included(p) => Bound::Included(self.encode_key(p)),
            Bound::Excluded(p) => match prefix_end(&self.encode_key(p)) {
                Some(end) => Bound::Included(end),
                None => return Ok(Vec::new()),
            },
            Bound::Unbounded => Bound::Included(self.table_prefix().to_vec()),
        };
        let end = match &range.end {
            Bound::Excluded(p) => Some(self.encode_key(p)),
            Bound::Included(p) => prefix_end(&self.encode_key(p)),
            Bound::Unbounded => None,
        }
        .or(table_end);

        let start = match &start {
            Bound::Included(s) => Bound::Included(s.as_slice()),
            _ => Bound::Unbounded,
        };
        let end = match &end {
            Some(end) => Bound::Excluded(end.as_slice()),
            None => Bound::Unbounded,
        };
        let pairs = txn.scan_range(start, end)?;
        pairs.iter().map(|(k, v)| self.decode(k, v)).collect()
    }
}
