//! CLI argument definitions using clap
//!
//! Commands:
//! - relkv init --data-dir <path>
//! - relkv wal-dump --data-dir <path>
//! - relkv verify --data-dir <path>
//!
//! Every command also accepts `--config <path>`; an explicit
//! `--data-dir` overrides the config's `data_dir`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// relkv - embeddable relational row store
#[derive(Parser, Debug)]
#[command(name = "relkv")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where a command finds its store.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Data directory holding `wal/relkv.wal`
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty WAL in a new data directory
    Init {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Print every WAL record as one JSON line
    WalDump {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Replay the WAL and report the recovered state
    Verify {
        #[command(flatten)]
        store: StoreArgs,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
