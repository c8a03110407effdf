//! Transaction - snapshot plus private write delta
//!
//! A transaction reads from the committed tree it was begun on, overlaid
//! with its own pending writes. Nothing it does is visible to other
//! transactions until `commit` publishes the delta.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::mvcc::errors::{TxnError, TxnResult};
use crate::mvcc::row_item::RowItem;
use crate::mvcc::store::VersionedStore;
use crate::mvcc::table::TableView;
use crate::mvcc::tree::OrdTree;
use crate::mvcc::CommitId;
use crate::types::TableDef;

/// Per-transaction read source and pending writes.
pub(crate) struct TxnState {
    pub(crate) snapshot: OrdTree<RowItem>,
    pub(crate) delta: BTreeSet<RowItem>,
}

impl TxnState {
    /// The item visible to this transaction for `probe`'s key, tombstones
    /// included. The delta shadows the snapshot.
    pub(crate) fn lookup(&self, probe: &RowItem) -> Option<&RowItem> {
        self.delta.get(probe).or_else(|| self.snapshot.get(probe))
    }

    /// The live row for `probe`'s key, if any.
    pub(crate) fn live(&self, probe: &RowItem) -> Option<&RowItem> {
        self.lookup(probe).filter(|item| !item.tombstone)
    }

    /// Records a pending write, replacing any earlier write of the same key.
    pub(crate) fn write(&mut self, item: RowItem) {
        self.delta.replace(item);
    }
}

pub struct Transaction {
    store: Arc<VersionedStore>,
    version: CommitId,
    state: Option<TxnState>,
}

impl Transaction {
    pub(crate) fn new(
        store: Arc<VersionedStore>,
        snapshot: OrdTree<RowItem>,
        version: CommitId,
    ) -> Self {
        Self {
            store,
            version,
            state: Some(TxnState {
                snapshot,
                delta: BTreeSet::new(),
            }),
        }
    }

    /// Commit version this transaction's snapshot was taken at.
    pub fn version(&self) -> CommitId {
        self.version
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Number of pending writes (including tombstones).
    pub fn pending_writes(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.delta.len())
    }

    /// Read/write view of one table inside this transaction.
    pub fn table<'a>(&'a mut self, def: &'a TableDef) -> TableView<'a> {
        TableView::new(self, def)
    }

    pub(crate) fn state(&self) -> TxnResult<&TxnState> {
        self.state.as_ref().ok_or(TxnError::Closed)
    }

    pub(crate) fn state_mut(&mut self) -> TxnResult<&mut TxnState> {
        self.state.as_mut().ok_or(TxnError::Closed)
    }

    /// Publishes the delta.
    ///
    /// On conflict the store is unchanged and the transaction is gone; the
    /// caller redoes the whole transaction on a fresh snapshot.
    pub fn commit(mut self) -> TxnResult<CommitId> {
        let state = self.state.take().ok_or(TxnError::Closed)?;
        if state.delta.is_empty() {
            debug!(version = self.version.value(), "read-only commit");
            return Ok(self.version);
        }
        // Release the snapshot before waiting on the commit lock.
        drop(state.snapshot);
        self.store.commit(self.version, &state.delta)
    }

    /// Discards the delta and snapshot. Calling it again does nothing.
    pub fn rollback(&mut self) {
        if let Some(state) = self.state.take() {
            self.store.metrics().increment_rollbacks();
            debug!(
                version = self.version.value(),
                discarded = state.delta.len(),
                "rolled back"
            );
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.rollback();
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("version", &self.version)
            .field("active", &self.is_active())
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}
