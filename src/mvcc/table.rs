//! Table views over a transaction
//!
//! Reads merge two ordered sources: the transaction's snapshot and its
//! delta. Both are walked in key order; on equal keys the delta entry
//! wins, and a winning tombstone hides the row.
//!
//! Rows cross this API in declaration column order. Keys and key
//! prefixes are given in primary-key order.

use std::cmp::Ordering;
use std::collections::btree_set;
use std::iter::Peekable;
use std::ops::Bound;

use crate::mvcc::errors::{TxnError, TxnResult};
use crate::mvcc::row_item::RowItem;
use crate::mvcc::transaction::{Transaction, TxnState};
use crate::mvcc::tree;
use crate::types::{TableDef, Value};

/// Range over primary-key prefixes.
///
/// A bound prefix shorter than the key matches every key it prefixes:
/// `Included([5])` as a lower bound starts at the first key beginning
/// with 5, `Excluded([5])` as an upper bound stops before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Bound<Vec<Value>>,
    pub end: Bound<Vec<Value>>,
}

impl KeyRange {
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Every key at or after `start`.
    pub fn starting_at(start: Vec<Value>) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Unbounded,
        }
    }

    /// Every key that begins with `prefix`.
    pub fn prefix(prefix: Vec<Value>) -> Self {
        Self {
            start: Bound::Included(prefix.clone()),
            end: Bound::Included(prefix),
        }
    }

    /// Keys at or after `start` and before `end`.
    pub fn between(start: Vec<Value>, end: Vec<Value>) -> Self {
        Self {
            start: Bound::Included(start),
            end: Bound::Excluded(end),
        }
    }

    fn before_start(&self, item: &RowItem) -> bool {
        match &self.start {
            Bound::Excluded(p) => item.cmp_key_prefix(p) != Ordering::Greater,
            Bound::Included(p) => item.cmp_key_prefix(p) == Ordering::Less,
            Bound::Unbounded => false,
        }
    }

    fn past_end(&self, item: &RowItem) -> bool {
        match &self.end {
            Bound::Excluded(p) => item.cmp_key_prefix(p) != Ordering::Less,
            Bound::Included(p) => item.cmp_key_prefix(p) == Ordering::Greater,
            Bound::Unbounded => false,
        }
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Merge of snapshot and delta, yielding visible items of one table.
pub(crate) struct MergeScan<'a> {
    snapshot: Peekable<tree::Iter<'a, RowItem>>,
    delta: Peekable<btree_set::Range<'a, RowItem>>,
    table_id: u32,
    range: KeyRange,
    done: bool,
}

impl<'a> MergeScan<'a> {
    /// Scans `range`, or only the part strictly after `resume` when given.
    pub(crate) fn new(
        state: &'a TxnState,
        def: &TableDef,
        range: KeyRange,
        resume: Option<&RowItem>,
    ) -> Self {
        let seek = match (&range.start, resume) {
            (_, Some(after)) => Bound::Excluded(after.clone()),
            (Bound::Included(p), None) | (Bound::Excluded(p), None) => {
                Bound::Included(RowItem::probe(def, p.clone()))
            }
            (Bound::Unbounded, None) => Bound::Included(RowItem::sentinel(def.table_id())),
        };
        let snapshot = state.snapshot.range_from(seek.as_ref()).peekable();
        let delta = state
            .delta
            .range::<RowItem, _>((seek.as_ref(), Bound::Unbounded))
            .peekable();
        Self {
            snapshot,
            delta,
            table_id: def.table_id(),
            range,
            done: false,
        }
    }

    fn next_merged(&mut self) -> Option<&'a RowItem> {
        match (self.snapshot.peek(), self.delta.peek()) {
            (None, None) => None,
            (Some(_), None) => self.snapshot.next(),
            (None, Some(_)) => self.delta.next(),
            (Some(s), Some(d)) => match (*s).cmp(*d) {
                Ordering::Less => self.snapshot.next(),
                Ordering::Greater => self.delta.next(),
                Ordering::Equal => {
                    self.snapshot.next();
                    self.delta.next()
                }
            },
        }
    }
}

impl<'a> Iterator for MergeScan<'a> {
    type Item = &'a RowItem;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some(item) = self.next_merged() else {
                self.done = true;
                break;
            };
            if item.table_id != self.table_id || self.range.past_end(item) {
                self.done = true;
                break;
            }
            if item.is_sentinel() || item.tombstone || self.range.before_start(item) {
                continue;
            }
            return Some(item);
        }
        None
    }
}

/// Iterator over visible rows, in declaration column order.
pub struct Rows<'a> {
    scan: MergeScan<'a>,
    def: &'a TableDef,
}

impl Iterator for Rows<'_> {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.scan.next()?;
        item.row.as_deref().map(|row| self.def.to_user(row))
    }
}

/// One table inside a transaction.
pub struct TableView<'a> {
    txn: &'a mut Transaction,
    def: &'a TableDef,
}

impl<'a> TableView<'a> {
    pub(crate) fn new(txn: &'a mut Transaction, def: &'a TableDef) -> Self {
        Self { txn, def }
    }

    pub fn def(&self) -> &TableDef {
        self.def
    }

    /// Looks up a row by its full primary key.
    pub fn get(&self, key: &[Value]) -> TxnResult<Option<Vec<Value>>> {
        self.def.check_key(key)?;
        let state = self.txn.state()?;
        let probe = RowItem::probe(self.def, key.to_vec());
        Ok(state
            .live(&probe)
            .and_then(|item| item.row.as_deref())
            .map(|row| self.def.to_user(row)))
    }

    /// Iterates visible rows in `range`, in key order.
    pub fn iter(&self, range: KeyRange) -> TxnResult<Rows<'_>> {
        let state = self.txn.state()?;
        Ok(Rows {
            scan: MergeScan::new(state, self.def, range, None),
            def: self.def,
        })
    }

    pub fn scan(&self, range: KeyRange) -> TxnResult<Vec<Vec<Value>>> {
        Ok(self.iter(range)?.collect())
    }

    /// Inserts a new row. A live row with the same key, whether pending in
    /// this transaction or in the snapshot, is a duplicate.
    pub fn insert(&mut self, row: Vec<Value>) -> TxnResult<()> {
        self.def.check_row(&row)?;
        let item = RowItem::pending(self.def, self.def.to_stored(&row));
        let state = self.txn.state_mut()?;
        if state.live(&item).is_some() {
            return Err(TxnError::DuplicateKey {
                table: self.def.name().to_string(),
            });
        }
        state.write(item);
        Ok(())
    }

    /// Replaces the row with the same primary key. Returns false when no
    /// such row is visible.
    pub fn update(&mut self, row: Vec<Value>) -> TxnResult<bool> {
        self.def.check_row(&row)?;
        let item = RowItem::pending(self.def, self.def.to_stored(&row));
        let state = self.txn.state_mut()?;
        if state.live(&item).is_none() {
            return Ok(false);
        }
        state.write(item);
        Ok(true)
    }

    /// Deletes by primary key. Returns false when no such row is visible.
    pub fn delete(&mut self, key: &[Value]) -> TxnResult<bool> {
        self.def.check_key(key)?;
        let probe = RowItem::probe(self.def, key.to_vec());
        let state = self.txn.state_mut()?;
        let Some(tombstone) = state.live(&probe).map(RowItem::to_tombstone) else {
            return Ok(false);
        };
        state.write(tombstone);
        Ok(true)
    }

    /// Positioned cursor over `range`.
    pub fn cursor(self, range: KeyRange) -> TableCursor<'a> {
        TableCursor {
            txn: self.txn,
            def: self.def,
            range,
            position: Position::BeforeStart,
        }
    }
}

#[derive(Debug)]
enum Position {
    BeforeStart,
    At(RowItem),
    /// The row under the cursor was deleted or moved to another key.
    Removed(RowItem),
    Finished,
}

/// Cursor that can modify the row it is positioned on.
///
/// Each step seeks past the last visited key, so writes made through the
/// cursor never invalidate it. A row moved forward by a key-changing
/// `update_current` is visited again when the cursor reaches its new key.
pub struct TableCursor<'a> {
    txn: &'a mut Transaction,
    def: &'a TableDef,
    range: KeyRange,
    position: Position,
}

impl TableCursor<'_> {
    /// Advances to the next visible row and returns it.
    pub fn next(&mut self) -> TxnResult<Option<Vec<Value>>> {
        let resume = match &self.position {
            Position::BeforeStart => None,
            Position::At(item) | Position::Removed(item) => Some(item),
            Position::Finished => return Ok(None),
        };
        let state = self.txn.state()?;
        let found = MergeScan::new(state, self.def, self.range.clone(), resume)
            .next()
            .cloned();
        match found {
            Some(item) => {
                let row = item.row.as_deref().map(|r| self.def.to_user(r));
                self.position = Position::At(item);
                Ok(row)
            }
            None => {
                self.position = Position::Finished;
                Ok(None)
            }
        }
    }

    /// Row the cursor is positioned on, if any.
    pub fn current(&self) -> Option<Vec<Value>> {
        match &self.position {
            Position::At(item) => item.row.as_deref().map(|r| self.def.to_user(r)),
            _ => None,
        }
    }

    /// Deletes the current row.
    ///
    /// # Panics
    ///
    /// When the cursor is not positioned on a row.
    pub fn delete_current(&mut self) -> TxnResult<()> {
        let Position::At(item) = &self.position else {
            panic!("delete_current called on a cursor that is not positioned on a row");
        };
        let item = item.clone();
        self.txn.state_mut()?.write(item.to_tombstone());
        self.position = Position::Removed(item);
        Ok(())
    }

    /// Replaces the current row. A change to primary-key columns is a
    /// delete of the old key plus an insert of the new one.
    ///
    /// # Panics
    ///
    /// When the cursor is not positioned on a row.
    pub fn update_current(&mut self, row: Vec<Value>) -> TxnResult<()> {
        let Position::At(current) = &self.position else {
            panic!("update_current called on a cursor that is not positioned on a row");
        };
        let current = current.clone();
        self.def.check_row(&row)?;
        let item = RowItem::pending(self.def, self.def.to_stored(&row));
        let state = self.txn.state_mut()?;

        if item.cmp(&current) == Ordering::Equal {
            state.write(item.clone());
            self.position = Position::At(item);
            return Ok(());
        }

        if state.live(&item).is_some() {
            return Err(TxnError::DuplicateKey {
                table: self.def.name().to_string(),
            });
        }
        state.write(current.to_tombstone());
        state.write(item);
        self.position = Position::Removed(current);
        Ok(())
    }
}
