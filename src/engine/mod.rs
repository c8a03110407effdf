//! Engine selection
//!
//! `Engine` is the closed set of backends a store can run on, chosen by
//! `StoreConfig::engine` when the store is opened. `EngineTxn` gives both
//! the same row-level operations.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, EngineKind, StoreConfig};
use crate::kv::{KvEngine, KvError, KvTable, KvTxn, MemoryKv, MemoryTxn};
use crate::mvcc::{CommitId, KeyRange, Transaction, TxnError, VersionedStore};
use crate::types::{TableDef, Value};
use crate::wal::Severity;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Txn(#[from] TxnError),

    #[error(transparent)]
    Kv(#[from] KvError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Txn(e) => e.code(),
            EngineError::Kv(e) => e.code(),
            EngineError::Config(_) => "RELKV_CONFIG",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            EngineError::Txn(e) => e.severity(),
            EngineError::Kv(e) => e.severity(),
            EngineError::Config(_) => Severity::Error,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Txn(e) if e.is_retryable())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Clone)]
pub enum Engine {
    Mvcc(Arc<VersionedStore>),
    Memory(MemoryKv),
}

impl Engine {
    pub fn open(config: &StoreConfig) -> EngineResult<Self> {
        config.validate()?;
        let engine = match config.engine {
            EngineKind::Mvcc => Engine::Mvcc(VersionedStore::open(config)?),
            EngineKind::Memory => Engine::Memory(MemoryKv::new()),
        };
        info!(engine = ?config.engine, durable = config.wal_dir().is_some(), "engine opened");
        Ok(engine)
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            Engine::Mvcc(_) => EngineKind::Mvcc,
            Engine::Memory(_) => EngineKind::Memory,
        }
    }

    pub fn begin(&self) -> EngineResult<EngineTxn> {
        Ok(match self {
            Engine::Mvcc(store) => EngineTxn::Mvcc(store.begin()),
            Engine::Memory(kv) => EngineTxn::Memory(kv.begin()?),
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Mvcc(store) => f
                .debug_tuple("Mvcc")
                .field(&store.version())
                .finish(),
            Engine::Memory(kv) => f.debug_tuple("Memory").field(kv).finish(),
        }
    }
}

/// A transaction on either backend.
pub enum EngineTxn {
    Mvcc(Transaction),
    Memory(MemoryTxn),
}

impl EngineTxn {
    pub fn get(&mut self, def: &TableDef, key: &[Value]) -> EngineResult<Option<Vec<Value>>> {
        Ok(match self {
            EngineTxn::Mvcc(tx) => tx.table(def).get(key)?,
            EngineTxn::Memory(tx) => KvTable::new(def).get(tx, key)?,
        })
    }

    pub fn insert(&mut self, def: &TableDef, row: Vec<Value>) -> EngineResult<()> {
        match self {
            EngineTxn::Mvcc(tx) => tx.table(def).insert(row)?,
            EngineTxn::Memory(tx) => KvTable::new(def).insert(tx, &row)?,
        }
        Ok(())
    }

    pub fn update(&mut self, def: &TableDef, row: Vec<Value>) -> EngineResult<bool> {
        Ok(match self {
            EngineTxn::Mvcc(tx) => tx.table(def).update(row)?,
            EngineTxn::Memory(tx) => KvTable::new(def).update(tx, &row)?,
        })
    }

    pub fn delete(&mut self, def: &TableDef, key: &[Value]) -> EngineResult<bool> {
        Ok(match self {
            EngineTxn::Mvcc(tx) => tx.table(def).delete(key)?,
            EngineTxn::Memory(tx) => KvTable::new(def).delete(tx, key)?,
        })
    }

    pub fn scan(&mut self, def: &TableDef, range: KeyRange) -> EngineResult<Vec<Vec<Value>>> {
        Ok(match self {
            EngineTxn::Mvcc(tx) => tx.table(def).scan(range)?,
            EngineTxn::Memory(tx) => KvTable::new(def).scan(tx, &range)?,
        })
    }

    /// Commits. The MVCC backend reports the resulting version.
    pub fn commit(self) -> EngineResult<Option<CommitId>> {
        match self {
            EngineTxn::Mvcc(tx) => Ok(Some(tx.commit()?)),
            EngineTxn::Memory(tx) => {
                tx.commit()?;
                Ok(None)
            }
        }
    }

    pub fn rollback(self) {
        match self {
            EngineTxn::Mvcc(mut tx) => tx.rollback(),
            EngineTxn::Memory(tx) => tx.rollback(),
        }
    }
}
