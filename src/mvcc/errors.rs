//! Transaction error types
//!
//! Error codes:
//! - RELKV_WRITE_CONFLICT (ERROR severity, retryable)
//! - RELKV_DUPLICATE_KEY (ERROR severity)
//! - RELKV_TXN_CLOSED (ERROR severity)
//! - RELKV_SCHEMA (ERROR severity)
//! - RELKV_CONFIG (ERROR severity)
//! - RELKV_CORRUPTION (FATAL severity)
//! - RELKV_COMMIT_ORDER (FATAL severity)
//! - WAL codes, see `wal::WalError`
//!
//! Contract violations by the caller (operating on an unpositioned
//! cursor row) are panics, not errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::mvcc::{CommitAuthorityError, CommitId};
use crate::types::TableDefError;
use crate::wal::{Severity, WalError};

#[derive(Debug, Error)]
pub enum TxnError {
    /// A key in the delta was committed by another transaction after this
    /// transaction's snapshot. The whole transaction must be redone.
    #[error(
        "write conflict on table {table_id}: key committed at {committed} after snapshot {snapshot}"
    )]
    Conflict {
        table_id: u32,
        snapshot: CommitId,
        committed: CommitId,
    },

    #[error("duplicate primary key in table {table}")]
    DuplicateKey { table: String },

    #[error("transaction is no longer active")]
    Closed,

    #[error(transparent)]
    Schema(#[from] TableDefError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("corrupt data: {0}")]
    Corruption(String),

    #[error(transparent)]
    CommitOrder(#[from] CommitAuthorityError),

    #[error(transparent)]
    Wal(#[from] WalError),
}

impl TxnError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            TxnError::Conflict { .. } => "RELKV_WRITE_CONFLICT",
            TxnError::DuplicateKey { .. } => "RELKV_DUPLICATE_KEY",
            TxnError::Closed => "RELKV_TXN_CLOSED",
            TxnError::Schema(_) => "RELKV_SCHEMA",
            TxnError::Config(_) => "RELKV_CONFIG",
            TxnError::Corruption(_) => "RELKV_CORRUPTION",
            TxnError::CommitOrder(_) => "RELKV_COMMIT_ORDER",
            TxnError::Wal(e) => e.code(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            TxnError::Corruption(_) | TxnError::CommitOrder(_) => Severity::Fatal,
            TxnError::Wal(e) => e.severity(),
            _ => Severity::Error,
        }
    }

    /// True when restarting the transaction from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TxnError::Conflict { .. })
    }
}

/// Result type for transaction operations
pub type TxnResult<T> = Result<T, TxnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflict_is_retryable() {
        let conflict = TxnError::Conflict {
            table_id: 1,
            snapshot: CommitId::new(3),
            committed: CommitId::new(4),
        };
        assert!(conflict.is_retryable());
        assert_eq!(conflict.code(), "RELKV_WRITE_CONFLICT");
        assert!(!TxnError::DuplicateKey { table: "t".into() }.is_retryable());
        assert!(!TxnError::Closed.is_retryable());
    }

    #[test]
    fn test_corruption_is_fatal() {
        assert_eq!(TxnError::Corruption("x".into()).severity(), Severity::Fatal);
        assert_eq!(TxnError::Closed.severity(), Severity::Error);
    }

    #[test]
    fn test_wal_errors_keep_their_code() {
        let err = TxnError::from(WalError::Poisoned);
        assert_eq!(err.code(), "RELKV_WAL_POISONED");
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn test_conflict_display() {
        let conflict = TxnError::Conflict {
            table_id: 2,
            snapshot: CommitId::new(5),
            committed: CommitId::new(6),
        };
        assert_eq!(
            conflict.to_string(),
            "write conflict on table 2: key committed at v6 after snapshot v5"
        );
    }
}
