//! Write-Ahead Log (WAL) subsystem
//!
//! The WAL is the durability record of committed transactions: one
//! record per commit, appended before the commit becomes visible.
//! Replaying the file in order rebuilds the committed tree, with
//! record N carrying the mutations of version N.

mod errors;
mod reader;
mod record;
mod writer;

pub use errors::{Severity, WalError, WalResult};
pub use reader::WalReader;
pub use record::{
    check_header, header, CommitRecord, Decoded, WalEntry, COMMIT_MARKER, ENTRY_DELETE,
    ENTRY_SET, WAL_FORMAT_VERSION, WAL_HEADER_LEN, WAL_SIGNATURE,
};
pub use writer::{wal_path, WalWriter, WAL_FILE_NAME};
