//! CLI module for relkv
//!
//! Provides command-line inspection of a data directory:
//! - init: Create an empty WAL
//! - wal-dump: Print WAL records as JSON lines
//! - verify: Replay the WAL and report the recovered state

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, StoreArgs};
pub use commands::{init, run, run_command, verify, wal_dump};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_line, write_response};
