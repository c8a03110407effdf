//! WAL writer
//!
//! - One commit record is written with a single `write_all`
//! - With `sync_on_commit`, the record is fsynced before `append`
//!   returns, and the commit is not published before that
//! - A torn tail left by an interrupted append is truncated at open
//! - After any failed append the writer refuses further appends, since
//!   the file may end in a partial record

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::errors::{WalError, WalResult};
use super::reader::WalReader;
use super::record::{header, CommitRecord};

/// File name of the WAL inside `<data_dir>/wal/`.
pub const WAL_FILE_NAME: &str = "relkv.wal";

/// Returns `<data_dir>/wal/relkv.wal`.
pub fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal").join(WAL_FILE_NAME)
}

/// Append-only WAL writer.
pub struct WalWriter {
    wal_path: PathBuf,
    file: File,
    sync_on_commit: bool,
    /// Records in the file, including those present at open.
    record_count: u64,
    poisoned: bool,
}

impl WalWriter {
    /// Opens or creates the WAL under `data_dir`.
    ///
    /// A new or empty file gets a header. An existing file is scanned to
    /// its last complete record; a torn tail after it is truncated.
    pub fn open(data_dir: &Path, sync_on_commit: bool) -> WalResult<Self> {
        let wal_path = wal_path(data_dir);
        let wal_dir = data_dir.join("wal");
        fs::create_dir_all(&wal_dir).map_err(|e| {
            WalError::io(format!("failed to create WAL directory {}", wal_dir.display()), e)
        })?;

        let existing_len = match fs::metadata(&wal_path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(WalError::io("failed to read WAL metadata", e)),
        };
        if existing_len > 0 {
            return Self::resume(WalReader::open(&wal_path)?, sync_on_commit);
        }

        let mut file = File::create(&wal_path).map_err(|e| {
            WalError::io(format!("failed to create WAL file {}", wal_path.display()), e)
        })?;
        file.write_all(&header())
            .map_err(|e| WalError::io("failed to write WAL header", e))?;
        file.sync_all()
            .map_err(|e| WalError::fsync_failed("fsync failed after WAL header", e))?;
        info!(path = %wal_path.display(), "created WAL");
        Self::append_to(wal_path, sync_on_commit, 0)
    }

    /// Continues the WAL behind `reader`, after its last complete record.
    ///
    /// Records the reader has not returned yet are skipped over (and
    /// counted), so a replaying caller passes the reader it drained and the
    /// file is parsed once. A torn tail is truncated.
    pub fn resume(mut reader: WalReader, sync_on_commit: bool) -> WalResult<Self> {
        reader.read_all()?;
        let wal_path = reader.path().to_path_buf();
        if reader.torn_bytes() > 0 {
            warn!(
                path = %wal_path.display(),
                torn_bytes = reader.torn_bytes(),
                valid_len = reader.valid_len(),
                "truncating torn WAL tail"
            );
            let file = OpenOptions::new()
                .write(true)
                .open(&wal_path)
                .map_err(|e| WalError::io("failed to open WAL for truncation", e))?;
            file.set_len(reader.valid_len())
                .map_err(|e| WalError::io("failed to truncate torn WAL tail", e))?;
            file.sync_all()
                .map_err(|e| WalError::fsync_failed("fsync failed after WAL truncation", e))?;
        }
        Self::append_to(wal_path, sync_on_commit, reader.records_read())
    }

    fn append_to(wal_path: PathBuf, sync_on_commit: bool, record_count: u64) -> WalResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .open(&wal_path)
            .map_err(|e| {
                WalError::io(format!("failed to open WAL file {}", wal_path.display()), e)
            })?;

        Ok(Self {
            wal_path,
            file,
            sync_on_commit,
            record_count,
            poisoned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Appends one commit record, returning the bytes written.
    pub fn append(&mut self, record: &CommitRecord) -> WalResult<u64> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        let serialized = record.serialize();

        if let Err(e) = self.file.write_all(&serialized) {
            self.poisoned = true;
            return Err(WalError::io(
                format!("failed to write WAL record {}", self.record_count + 1),
                e,
            ));
        }
        if self.sync_on_commit {
            if let Err(e) = self.file.sync_data() {
                self.poisoned = true;
                return Err(WalError::fsync_failed(
                    format!("fsync failed after WAL record {}", self.record_count + 1),
                    e,
                ));
            }
        }

        self.record_count += 1;
        Ok(serialized.len() as u64)
    }
}
