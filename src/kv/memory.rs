//! In-memory ordered KV engine
//!
//! The committed map sits behind an `Arc`; a transaction keeps the `Arc`
//! it began with as its snapshot and buffers writes. Commit applies the
//! buffer in one step under the writer lock. There is no conflict
//! detection: the last committer wins.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{KvEngine, KvPairs, KvResult, KvTxn};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// Shared handle; clones refer to the same data.
#[derive(Clone, Default)]
pub struct MemoryKv {
    committed: Arc<RwLock<Arc<Map>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.committed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKv").field("keys", &self.len()).finish()
    }
}

impl KvEngine for MemoryKv {
    type Txn = MemoryTxn;

    fn begin(&self) -> KvResult<MemoryTxn> {
        let snapshot = Arc::clone(&self.committed.read());
        Ok(MemoryTxn {
            committed: Arc::clone(&self.committed),
            snapshot,
            writes: BTreeMap::new(),
        })
    }
}

pub struct MemoryTxn {
    committed: Arc<RwLock<Arc<Map>>>,
    snapshot: Arc<Map>,
    /// `None` marks a pending delete.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl KvTxn for MemoryTxn {
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => Ok(self.snapshot.get(key).cloned()),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> KvResult<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn scan_range(&self, start: Bound<&[u8]>, end: Bound<&[u8]>) -> KvResult<KvPairs> {
        if is_empty_range(start, end) {
            return Ok(Vec::new());
        }
        let mut merged: BTreeMap<&[u8], Option<&[u8]>> = self
            .snapshot
            .range::<[u8], _>((start, end))
            .map(|(k, v)| (k.as_slice(), Some(v.as_slice())))
            .collect();
        for (k, v) in self.writes.range::<[u8], _>((start, end)) {
            merged.insert(k.as_slice(), v.as_deref());
        }
        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_vec(), v.to_vec())))
            .collect())
    }

    fn commit(self) -> KvResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let mut committed = self.committed.write();
        let map = Arc::make_mut(&mut committed);
        let count = self.writes.len();
        for (key, value) in self.writes {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        debug!(writes = count, "memory kv commit");
        Ok(())
    }

    fn rollback(self) {}
}

impl MemoryTxn {
    /// Number of buffered writes, deletes included.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }
}

/// True for bounds `BTreeMap::range` would reject or that select nothing.
fn is_empty_range(start: Bound<&[u8]>, end: Bound<&[u8]>) -> bool {
    match (start, end) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => {
            s >= e
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(kv: &MemoryKv, pairs: &[(&str, &str)]) {
        let mut tx = kv.begin().unwrap();
        for (k, v) in pairs {
            tx.set(k.as_bytes(), v.as_bytes()).unwrap();
        }
        tx.commit().unwrap();
    }

    #[test]
    fn test_reads_see_own_writes() {
        let kv = MemoryKv::new();
        let mut tx = kv.begin().unwrap();
        tx.set(b"a", b"1").unwrap();
        assert_eq!(tx.get(b"a").unwrap(), Some(b"1".to_vec()));
        tx.delete(b"a").unwrap();
        assert_eq!(tx.get(b"a").unwrap(), None);
        assert!(kv.is_empty());
    }

    #[test]
    fn test_snapshot_isolated_from_later_commit() {
        let kv = MemoryKv::new();
        put(&kv, &[("a", "1")]);
        let reader = kv.begin().unwrap();
        put(&kv, &[("a", "2"), ("b", "3")]);
        assert_eq!(reader.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reader.get(b"b").unwrap(), None);
        assert_eq!(kv.len(), 2);
    }

    #[test]
    fn test_scan_merges_pending_writes() {
        let kv = MemoryKv::new();
        put(&kv, &[("k1", "a"), ("k2", "b"), ("k3", "c"), ("z", "z")]);
        let mut tx = kv.begin().unwrap();
        tx.delete(b"k2").unwrap();
        tx.set(b"k0", b"new").unwrap();
        tx.set(b"k3", b"C").unwrap();

        let pairs = tx.scan_prefix(b"k").unwrap();
        let keys: Vec<&[u8]> = pairs.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"k0".as_slice(), b"k1".as_slice(), b"k3".as_slice()]);
        assert_eq!(pairs[2].1, b"C".to_vec());

        let seek = tx.seek(b"k1", 2).unwrap();
        assert_eq!(seek.len(), 2);
        assert_eq!(seek[0].0, b"k1".to_vec());
    }

    #[test]
    fn test_empty_or_inverted_range() {
        let kv = MemoryKv::new();
        put(&kv, &[("a", "1")]);
        let tx = kv.begin().unwrap();
        assert!(tx
            .scan_range(Bound::Included(b"b".as_slice()), Bound::Included(b"a".as_slice()))
            .unwrap()
            .is_empty());
        assert!(tx
            .scan_range(Bound::Excluded(b"a".as_slice()), Bound::Excluded(b"a".as_slice()))
            .unwrap()
            .is_empty());
        assert_eq!(
            tx.scan_range(Bound::Included(b"a".as_slice()), Bound::Included(b"a".as_slice()))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_last_committer_wins() {
        let kv = MemoryKv::new();
        let mut t1 = kv.begin().unwrap();
        let mut t2 = kv.begin().unwrap();
        t1.set(b"k", b"one").unwrap();
        t2.set(b"k", b"two").unwrap();
        t1.commit().unwrap();
        t2.commit().unwrap();
        let tx = kv.begin().unwrap();
        assert_eq!(tx.get(b"k").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let kv = MemoryKv::new();
        let mut tx = kv.begin().unwrap();
        tx.set(b"k", b"v").unwrap();
        tx.rollback();
        assert!(kv.is_empty());
    }
}
