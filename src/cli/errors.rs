//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero status.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::mvcc::TxnError;
use crate::wal::WalError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error or missing data directory
    ConfigError,
    /// I/O error (stdout or filesystem)
    IoError,
    /// WAL already exists
    AlreadyInitialized,
    /// No WAL to read
    NotInitialized,
    /// WAL unreadable or replay failed
    RecoveryFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "RELKV_CLI_CONFIG_ERROR",
            Self::IoError => "RELKV_CLI_IO_ERROR",
            Self::AlreadyInitialized => "RELKV_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "RELKV_CLI_NOT_INITIALIZED",
            Self::RecoveryFailed => "RELKV_CLI_RECOVERY_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Data directory already has a WAL",
        )
    }

    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Data directory has no WAL. Run 'relkv init' first.",
        )
    }

    pub fn recovery_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RecoveryFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<WalError> for CliError {
    fn from(e: WalError) -> Self {
        Self::recovery_failed(format!("{}: {}", e.code(), e))
    }
}

impl From<TxnError> for CliError {
    fn from(e: TxnError) -> Self {
        match e {
            TxnError::Config(e) => e.into(),
            other => Self::recovery_failed(format!("{}: {}", other.code(), other)),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
