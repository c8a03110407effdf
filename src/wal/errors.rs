//! WAL error types
//!
//! Error codes:
//! - RELKV_WAL_IO (ERROR severity)
//! - RELKV_WAL_FSYNC_FAILED (FATAL severity)
//! - RELKV_WAL_CORRUPTION (FATAL severity)
//! - RELKV_WAL_POISONED (FATAL severity)

use std::fmt;
use std::io;

use thiserror::Error;

/// Severity levels shared by every error type in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the engine continues
    Error,
    /// The store can no longer guarantee durability and must be reopened
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// WAL error with full context.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    FsyncFailed {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("corrupt WAL at byte {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    #[error("WAL writer is unusable after an earlier failed append")]
    Poisoned,
}

impl WalError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        WalError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn fsync_failed(context: impl Into<String>, source: io::Error) -> Self {
        WalError::FsyncFailed {
            context: context.into(),
            source,
        }
    }

    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        WalError::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            WalError::Io { .. } => "RELKV_WAL_IO",
            WalError::FsyncFailed { .. } => "RELKV_WAL_FSYNC_FAILED",
            WalError::Corruption { .. } => "RELKV_WAL_CORRUPTION",
            WalError::Poisoned => "RELKV_WAL_POISONED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            WalError::Io { .. } => Severity::Error,
            WalError::FsyncFailed { .. } | WalError::Corruption { .. } | WalError::Poisoned => {
                Severity::Fatal
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for WAL operations
pub type WalResult<T> = Result<T, WalError>;
