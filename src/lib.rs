//! relkv - an embeddable relational storage engine
//!
//! Table rows live in an ordered, versioned key space:
//! - `codec` - order-preserving key encoding and sparse row values
//! - `mvcc` - snapshot transactions over a persistent tree, with
//!   first-committer-wins conflict detection at commit
//! - `wal` - append-only commit log replayed at open
//! - `kv` / `engine` - byte-keyed backends behind one row interface

pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod kv;
pub mod mvcc;
pub mod observability;
pub mod types;
pub mod wal;

pub use config::{EngineKind, StoreConfig};
pub use engine::{Engine, EngineError, EngineTxn};
pub use mvcc::{CommitId, KeyRange, TableCursor, TableView, Transaction, TxnError, VersionedStore};
pub use types::{ColumnKey, ColumnType, TableDef, Value};
