//! VersionedStore - committed snapshot tree and commit coordinator
//!
//! State:
//! - the committed tree (persistent, so `begin` shares it in O(1))
//! - the current commit version
//!
//! Locks:
//! - state lock (`RwLock`): held only to clone the tree or to publish a
//!   new one
//! - commit lock (`Mutex`): serializes commits end to end and owns the
//!   WAL writer and commit authority
//!
//! Commit protocol:
//! 1. take the commit lock
//! 2. clone the current committed tree under the state lock
//! 3. next version = current + 1
//! 4. walk the delta in key order and validate each entry against the
//!    current tree (not the transaction's snapshot); accepted entries
//!    are stamped and applied to the private clone
//! 5. append the WAL record, then publish the clone under the state lock
//!
//! A conflict anywhere in step 4 drops the clone: nothing is applied.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::mvcc::errors::{TxnError, TxnResult};
use crate::mvcc::row_item::RowItem;
use crate::mvcc::transaction::Transaction;
use crate::mvcc::tree::OrdTree;
use crate::mvcc::{CommitAuthority, CommitId};
use crate::observability::MetricsRegistry;
use crate::wal::{wal_path, CommitRecord, WalEntry, WalReader, WalWriter};

struct CommittedState {
    tree: OrdTree<RowItem>,
    version: CommitId,
}

struct CommitLog {
    authority: CommitAuthority,
    wal: Option<WalWriter>,
}

/// Shared handle to one store. Transactions hold an `Arc` to it.
pub struct VersionedStore {
    state: RwLock<CommittedState>,
    commit_lock: Mutex<CommitLog>,
    metrics: MetricsRegistry,
}

impl VersionedStore {
    /// Volatile store without a WAL.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self::with_parts(
            OrdTree::new(),
            CommitAuthority::new(),
            None,
            MetricsRegistry::new(),
        ))
    }

    /// Opens a store, replaying the WAL when the configuration has one.
    pub fn open(config: &StoreConfig) -> TxnResult<Arc<Self>> {
        config.validate()?;
        let metrics = MetricsRegistry::new();

        let Some(dir) = config.wal_dir() else {
            return Ok(Arc::new(Self::with_parts(
                OrdTree::new(),
                CommitAuthority::new(),
                None,
                metrics,
            )));
        };
        let path = wal_path(dir);
        let has_records = std::fs::metadata(&path).map_or(false, |m| m.len() > 0);
        if !has_records {
            let wal = WalWriter::open(dir, config.sync_on_commit)?;
            return Ok(Arc::new(Self::with_parts(
                OrdTree::new(),
                CommitAuthority::new(),
                Some(wal),
                metrics,
            )));
        }

        let mut reader = WalReader::open(&path)?;
        let (tree, authority) = replay(&mut reader, &metrics)?;
        let wal = WalWriter::resume(reader, config.sync_on_commit)?;
        Ok(Arc::new(Self::with_parts(tree, authority, Some(wal), metrics)))
    }

    /// Rebuilds the committed state of the WAL at `wal_path` without
    /// touching the file.
    ///
    /// The store has no WAL writer, so later commits stay in memory. Also
    /// returns the size of a torn tail, which is left in place.
    pub fn replay_detached(wal_path: &Path) -> TxnResult<(Arc<Self>, u64)> {
        let metrics = MetricsRegistry::new();
        let mut reader = WalReader::open(wal_path)?;
        let (tree, authority) = replay(&mut reader, &metrics)?;
        let store = Self::with_parts(tree, authority, None, metrics);
        Ok((Arc::new(store), reader.torn_bytes()))
    }

    fn with_parts(
        tree: OrdTree<RowItem>,
        authority: CommitAuthority,
        wal: Option<WalWriter>,
        metrics: MetricsRegistry,
    ) -> Self {
        let version = authority.highest_commit_id();
        Self {
            state: RwLock::new(CommittedState { tree, version }),
            commit_lock: Mutex::new(CommitLog { authority, wal }),
            metrics,
        }
    }

    /// Starts a transaction on the current committed snapshot.
    pub fn begin(self: &Arc<Self>) -> Transaction {
        let (snapshot, version) = {
            let state = self.state.read();
            (state.tree.clone(), state.version)
        };
        self.metrics.increment_transactions_begun();
        debug!(version = version.value(), "begin transaction");
        Transaction::new(Arc::clone(self), snapshot, version)
    }

    /// Latest published commit version.
    pub fn version(&self) -> CommitId {
        self.state.read().version
    }

    /// Number of items in the committed tree, tombstones included.
    pub fn committed_len(&self) -> usize {
        self.state.read().tree.len()
    }

    /// Number of live (non-tombstone) rows in the committed tree.
    pub fn live_rows(&self) -> usize {
        let tree = self.state.read().tree.clone();
        tree.iter().filter(|item| !item.tombstone).count()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Validates and applies a transaction's delta.
    ///
    /// Returns the new version, or `tx_version` unchanged when every delta
    /// entry turned out to be a no-op.
    pub(crate) fn commit(
        &self,
        tx_version: CommitId,
        delta: &BTreeSet<RowItem>,
    ) -> TxnResult<CommitId> {
        let mut log = self.commit_lock.lock();

        let (mut tree, current) = {
            let state = self.state.read();
            (state.tree.clone(), state.version)
        };
        let next = log.authority.next_commit_id();
        debug_assert_eq!(next, current.next());

        let mut record = CommitRecord::new();
        for entry in delta {
            match tree.get(entry) {
                None if entry.tombstone => continue,
                None => {}
                Some(existing) if existing.version > tx_version => {
                    self.metrics.increment_conflicts();
                    warn!(
                        table_id = entry.table_id,
                        snapshot = tx_version.value(),
                        committed = existing.version.value(),
                        "write conflict, aborting commit"
                    );
                    return Err(TxnError::Conflict {
                        table_id: entry.table_id,
                        snapshot: tx_version,
                        committed: existing.version,
                    });
                }
                Some(existing) if existing.tombstone && entry.tombstone => continue,
                Some(_) => {}
            }

            let mut stamped = entry.clone();
            stamped.version = next;
            record.push(wal_entry(&stamped)?);
            tree.insert(stamped);
        }

        if record.is_empty() {
            self.metrics.increment_empty_commits();
            debug!(version = current.value(), "commit applied no changes");
            return Ok(current);
        }

        if let Some(wal) = log.wal.as_mut() {
            let bytes = wal.append(&record)?;
            self.metrics.add_wal_bytes(bytes);
            self.metrics.increment_wal_records();
        }
        log.authority.mark_committed(next)?;

        {
            let mut state = self.state.write();
            state.tree = tree;
            state.version = next;
        }
        self.metrics.increment_commits();
        debug!(version = next.value(), entries = record.len(), "committed");
        Ok(next)
    }
}

/// Applies every record `reader` yields; record N becomes version N.
fn replay(
    reader: &mut WalReader,
    metrics: &MetricsRegistry,
) -> TxnResult<(OrdTree<RowItem>, CommitAuthority)> {
    let mut tree = OrdTree::new();
    let mut authority = CommitAuthority::new();
    while let Some(record) = reader.read_next()? {
        let version = authority.next_commit_id();
        apply_record(&mut tree, &record, version);
        authority.mark_committed(version)?;
        metrics.increment_wal_replayed();
    }
    info!(
        path = %reader.path().display(),
        records = reader.records_read(),
        torn_bytes = reader.torn_bytes(),
        version = authority.highest_commit_id().value(),
        rows = tree.len(),
        "replayed WAL"
    );
    Ok((tree, authority))
}

fn wal_entry(item: &RowItem) -> TxnResult<WalEntry> {
    let Some(row) = &item.row else {
        return Err(TxnError::Corruption(
            "sentinel item reached the commit path".to_string(),
        ));
    };
    if item.tombstone {
        return Ok(WalEntry::Delete {
            table_id: item.table_id,
            reverse_mask: item.reverse_mask,
            key: item.key().to_vec(),
        });
    }
    let key_count = u8::try_from(item.key_count).map_err(|_| {
        TxnError::Corruption(format!("{} key columns do not fit a WAL entry", item.key_count))
    })?;
    Ok(WalEntry::Set {
        table_id: item.table_id,
        reverse_mask: item.reverse_mask,
        key_count,
        row: row.to_vec(),
    })
}

fn apply_record(tree: &mut OrdTree<RowItem>, record: &CommitRecord, version: CommitId) {
    for entry in &record.entries {
        let item = match entry {
            WalEntry::Set {
                table_id,
                reverse_mask,
                key_count,
                row,
            } => RowItem {
                table_id: *table_id,
                version,
                reverse_mask: *reverse_mask,
                key_count: usize::from(*key_count),
                tombstone: false,
                row: Some(row.clone().into()),
            },
            WalEntry::Delete {
                table_id,
                reverse_mask,
                key,
            } => RowItem {
                table_id: *table_id,
                version,
                reverse_mask: *reverse_mask,
                key_count: key.len(),
                tombstone: true,
                row: Some(key.clone().into()),
            },
        };
        tree.insert(item);
    }
}
