//! WAL reader for startup replay
//!
//! - Records are read strictly in file order; record N is version N
//! - A record cut short by the end of the file is a torn tail from an
//!   interrupted append: it is reported, never replayed
//! - A record that only looks cut short, because a damaged length runs
//!   over later intact records, is corruption
//! - Any other malformed byte halts replay with a corruption error

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{WalError, WalResult};
use super::record::{check_header, has_commit_footer, CommitRecord, Decoded, WAL_HEADER_LEN};

/// Sequential reader over a WAL file.
///
/// The whole file is loaded at open; the WAL is only read at startup and
/// by inspection tools.
pub struct WalReader {
    wal_path: PathBuf,
    data: Vec<u8>,
    /// Offset of the next unread record.
    offset: usize,
    records_read: u64,
    torn_tail: bool,
}

impl WalReader {
    /// Opens a WAL file and validates its header.
    pub fn open(wal_path: &Path) -> WalResult<Self> {
        let data = fs::read(wal_path).map_err(|e| {
            WalError::io(format!("failed to read WAL file {}", wal_path.display()), e)
        })?;
        check_header(&data).map_err(|reason| WalError::corruption_at_offset(0, reason))?;

        Ok(Self {
            wal_path: wal_path.to_path_buf(),
            data,
            offset: WAL_HEADER_LEN,
            records_read: 0,
            torn_tail: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.wal_path
    }

    /// Byte length of the header plus every complete record read so far.
    pub fn valid_len(&self) -> u64 {
        self.offset as u64
    }

    /// Bytes past the last complete record.
    pub fn torn_bytes(&self) -> u64 {
        if self.torn_tail {
            (self.data.len() - self.offset) as u64
        } else {
            0
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` at the end of the file, including when the
    /// remaining bytes are a torn record (see [`torn_bytes`](Self::torn_bytes)).
    pub fn read_next(&mut self) -> WalResult<Option<CommitRecord>> {
        if self.torn_tail || self.offset >= self.data.len() {
            return Ok(None);
        }
        match CommitRecord::deserialize(&self.data[self.offset..]) {
            Decoded::Record(record, used) => {
                self.offset += used;
                self.records_read += 1;
                Ok(Some(record))
            }
            Decoded::Truncated if has_commit_footer(&self.data[self.offset..]) => {
                Err(WalError::corruption_at_offset(
                    self.offset as u64,
                    format!(
                        "record {}: runs past the end of the file over a complete commit footer",
                        self.records_read + 1
                    ),
                ))
            }
            Decoded::Truncated => {
                self.torn_tail = true;
                Ok(None)
            }
            Decoded::Corrupt(at, reason) => Err(WalError::corruption_at_offset(
                (self.offset + at) as u64,
                format!("record {}: {}", self.records_read + 1, reason),
            )),
        }
    }

    /// Reads every remaining record.
    pub fn read_all(&mut self) -> WalResult<Vec<CommitRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_next()? {
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use crate::wal::record::{header, WalEntry};
    use tempfile::TempDir;

    fn record(id: i64) -> CommitRecord {
        CommitRecord {
            entries: vec![WalEntry::Set {
                table_id: 1,
                reverse_mask: 0,
                key_count: 1,
                row: vec![Value::Int64(id)],
            }],
        }
    }

    fn write_file(dir: &TempDir, body: &[u8]) -> PathBuf {
        let path = dir.path().join("test.wal");
        let mut bytes = header().to_vec();
        bytes.extend_from_slice(body);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_reads_records_in_order() {
        let dir = TempDir::new().unwrap();
        let mut body = record(1).serialize();
        body.extend(record(2).serialize());
        let path = write_file(&dir, &body);

        let mut reader = WalReader::open(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), vec![record(1), record(2)]);
        assert_eq!(reader.records_read(), 2);
        assert_eq!(reader.torn_bytes(), 0);
        assert_eq!(reader.valid_len(), (WAL_HEADER_LEN + body.len()) as u64);
    }

    #[test]
    fn test_torn_tail_ends_cleanly() {
        let dir = TempDir::new().unwrap();
        let mut body = record(1).serialize();
        let complete = body.len();
        let second = record(2).serialize();
        body.extend_from_slice(&second[..second.len() - 2]);
        let path = write_file(&dir, &body);

        let mut reader = WalReader::open(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), vec![record(1)]);
        assert_eq!(reader.valid_len(), (WAL_HEADER_LEN + complete) as u64);
        assert_eq!(reader.torn_bytes(), (second.len() - 2) as u64);
    }

    #[test]
    fn test_corruption_halts() {
        let dir = TempDir::new().unwrap();
        let mut body = record(1).serialize();
        body.push(0x55);
        let path = write_file(&dir, &body);

        let mut reader = WalReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap(), Some(record(1)));
        assert!(matches!(reader.read_next(), Err(WalError::Corruption { .. })));
    }

    #[test]
    fn test_overlong_length_before_intact_records_is_corruption() {
        let dir = TempDir::new().unwrap();
        let mut body = record(1).serialize();
        body.extend(record(2).serialize());
        // Payload length of the first entry: type, table id, mask, key count.
        assert_eq!(body[4], 0x03);
        body[4] = 0x7f;
        let path = write_file(&dir, &body);

        let mut reader = WalReader::open(&path).unwrap();
        assert!(matches!(
            reader.read_next(),
            Err(WalError::Corruption { offset, .. }) if offset == WAL_HEADER_LEN as u64
        ));
        assert_eq!(reader.torn_bytes(), 0);
    }

    #[test]
    fn test_bad_header_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.wal");
        fs::write(&path, b"NOTAWAL!\x01\0\0\0\0\0\0\0").unwrap();
        assert!(matches!(WalReader::open(&path), Err(WalError::Corruption { offset: 0, .. })));
    }
}
