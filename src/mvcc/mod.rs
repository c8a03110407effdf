//! Multi-version row store
//!
//! This module provides:
//! - `CommitId` - totally ordered commit version
//! - `CommitAuthority` - strictly increasing version assignment
//! - `OrdTree` - persistent ordered set backing committed snapshots
//! - `RowItem` - versioned row keyed by table id and primary key
//! - `VersionedStore` - committed state and commit coordinator
//! - `Transaction` / `TableView` / `TableCursor` - snapshot reads and
//!   buffered writes
//!
//! Isolation is snapshot isolation with first-committer-wins conflict
//! detection on written keys. Keys that were only read or range-scanned
//! are not validated at commit, so phantom inserts are possible.

mod commit_authority;
mod commit_id;
mod errors;
mod row_item;
mod store;
mod table;
mod transaction;
mod tree;

pub use commit_authority::{CommitAuthority, CommitAuthorityError};
pub use commit_id::CommitId;
pub use errors::{TxnError, TxnResult};
pub use row_item::RowItem;
pub use store::VersionedStore;
pub use table::{KeyRange, Rows, TableCursor, TableView};
pub use transaction::Transaction;
pub use tree::OrdTree;
