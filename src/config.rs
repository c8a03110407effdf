//! Store configuration
//!
//! Loaded from a JSON file or built in code. Every field has a default,
//! but the defaults enable the WAL, so a file must name `data_dir` or set
//! `wal_enabled` to false.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which storage engine backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Versioned tree with optimistic commit validation and WAL.
    #[default]
    Mvcc,
    /// Byte-keyed in-memory ordered map; never durable.
    Memory,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for the WAL. Required while the MVCC WAL is enabled.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub engine: EngineKind,

    /// Whether commits write to the WAL (requires `data_dir`).
    #[serde(default = "default_true")]
    pub wal_enabled: bool,

    /// fsync each WAL record before the commit is published.
    #[serde(default = "default_true")]
    pub sync_on_commit: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            engine: EngineKind::default(),
            wal_enabled: true,
            sync_on_commit: true,
        }
    }
}

impl StoreConfig {
    /// Volatile MVCC store without a WAL.
    pub fn in_memory() -> Self {
        Self {
            wal_enabled: false,
            ..Default::default()
        }
    }

    /// Durable MVCC store rooted at `data_dir`.
    pub fn durable(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Default::default()
        }
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file without validating it, for callers that
    /// fill in fields (such as `data_dir`) before [`validate`](Self::validate).
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("data_dir must not be empty".to_string()));
            }
        }
        if self.engine == EngineKind::Mvcc && self.wal_enabled && self.data_dir.is_none() {
            return Err(ConfigError::Invalid(
                "wal_enabled requires data_dir; set data_dir or disable the WAL".to_string(),
            ));
        }
        if self.engine == EngineKind::Memory && self.data_dir.is_some() && self.wal_enabled {
            return Err(ConfigError::Invalid(
                "the memory engine has no WAL; unset data_dir or wal_enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory holding the WAL, when one is in use.
    pub fn wal_dir(&self) -> Option<&Path> {
        match (self.engine, self.wal_enabled) {
            (EngineKind::Mvcc, true) => self.data_dir.as_deref(),
            _ => None,
        }
    }
}
