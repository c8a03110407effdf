//! WAL file and record layout
//!
//! File header (16 bytes):
//! - signature `RELKVWAL` (8 bytes)
//! - format version (u8)
//! - reserved (7 zero bytes)
//!
//! Commit record, one per committed transaction:
//! - entries, each:
//!   - record type (u8): SET (0x01) / DELETE (0x02)
//!   - table id (varint)
//!   - reverse mask (varint)
//!   - key column count (u8, SET only)
//!   - payload length (varint)
//!   - payload: row value encoding (full row for SET, key columns for DELETE)
//! - footer:
//!   - commit marker (u8, 0xC0)
//!   - total length of the entries (u32 BE)
//!
//! Record N in the file is the commit with version N.

use crate::codec::{decode_row_value, encode_row_value, put_uvarint, read_uvarint};
use crate::types::Value;

pub const WAL_SIGNATURE: &[u8; 8] = b"RELKVWAL";
pub const WAL_FORMAT_VERSION: u8 = 1;
pub const WAL_HEADER_LEN: usize = 16;

pub const ENTRY_SET: u8 = 0x01;
pub const ENTRY_DELETE: u8 = 0x02;
pub const COMMIT_MARKER: u8 = 0xC0;
const FOOTER_LEN: usize = 5;

/// Builds the 16-byte file header.
pub fn header() -> [u8; WAL_HEADER_LEN] {
    let mut out = [0u8; WAL_HEADER_LEN];
    out[..8].copy_from_slice(WAL_SIGNATURE);
    out[8] = WAL_FORMAT_VERSION;
    out
}

/// Checks a file header, returning a reason on mismatch.
pub fn check_header(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < WAL_HEADER_LEN {
        return Err(format!("header is {} bytes, expected {}", bytes.len(), WAL_HEADER_LEN));
    }
    if &bytes[..8] != WAL_SIGNATURE {
        return Err("bad signature".to_string());
    }
    if bytes[8] != WAL_FORMAT_VERSION {
        return Err(format!("unsupported format version {}", bytes[8]));
    }
    if bytes[9..WAL_HEADER_LEN].iter().any(|&b| b != 0) {
        return Err("reserved header bytes are not zero".to_string());
    }
    Ok(())
}

/// One mutated key within a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum WalEntry {
    Set {
        table_id: u32,
        reverse_mask: u64,
        key_count: u8,
        /// Full row in stored column order.
        row: Vec<Value>,
    },
    Delete {
        table_id: u32,
        reverse_mask: u64,
        /// Key columns in stored order.
        key: Vec<Value>,
    },
}

impl WalEntry {
    pub fn table_id(&self) -> u32 {
        match self {
            WalEntry::Set { table_id, .. } | WalEntry::Delete { table_id, .. } => *table_id,
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            WalEntry::Set {
                table_id,
                reverse_mask,
                key_count,
                row,
            } => {
                buf.push(ENTRY_SET);
                put_uvarint(buf, u64::from(*table_id));
                put_uvarint(buf, *reverse_mask);
                buf.push(*key_count);
                let payload = encode_row_value(row, row.len());
                put_uvarint(buf, payload.len() as u64);
                buf.extend_from_slice(&payload);
            }
            WalEntry::Delete {
                table_id,
                reverse_mask,
                key,
            } => {
                buf.push(ENTRY_DELETE);
                put_uvarint(buf, u64::from(*table_id));
                put_uvarint(buf, *reverse_mask);
                let payload = encode_row_value(key, key.len());
                put_uvarint(buf, payload.len() as u64);
                buf.extend_from_slice(&payload);
            }
        }
    }
}

/// All mutations of one commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitRecord {
    pub entries: Vec<WalEntry>,
}

/// Outcome of decoding one record from a byte stream.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// A complete record and the number of bytes it occupied.
    Record(CommitRecord, usize),
    /// The buffer ended inside a record.
    Truncated,
    /// A complete but invalid record, with the offset (relative to the
    /// record start) and reason.
    Corrupt(usize, String),
}

impl CommitRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: WalEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Serializes the record including its footer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for entry in &self.entries {
            entry.encode_into(&mut buf);
        }
        let body_len = buf.len() as u32;
        buf.push(COMMIT_MARKER);
        buf.extend_from_slice(&body_len.to_be_bytes());
        buf
    }

    /// Decodes the record at the front of `buf`.
    pub fn deserialize(buf: &[u8]) -> Decoded {
        let mut pos = 0usize;
        let mut record = CommitRecord::new();
        loop {
            let Some(&kind) = buf.get(pos) else {
                return Decoded::Truncated;
            };
            match kind {
                COMMIT_MARKER => {
                    let Some(len_bytes) = buf.get(pos + 1..pos + FOOTER_LEN) else {
                        return Decoded::Truncated;
                    };
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(len_bytes);
                    let declared = u32::from_be_bytes(raw) as usize;
                    if declared != pos {
                        return Decoded::Corrupt(
                            pos,
                            format!("footer length {} but entries span {} bytes", declared, pos),
                        );
                    }
                    if record.is_empty() {
                        return Decoded::Corrupt(pos, "commit record has no entries".to_string());
                    }
                    return Decoded::Record(record, pos + FOOTER_LEN);
                }
                ENTRY_SET | ENTRY_DELETE => match decode_entry(&buf[pos..]) {
                    EntryDecode::Entry(entry, used) => {
                        record.push(entry);
                        pos += used;
                    }
                    EntryDecode::Truncated => return Decoded::Truncated,
                    EntryDecode::Corrupt(reason) => return Decoded::Corrupt(pos, reason),
                },
                other => {
                    return Decoded::Corrupt(pos, format!("unknown record type 0x{:02x}", other))
                }
            }
        }
    }
}

/// Whether `buf` holds a complete commit footer for a record that starts
/// at offset 0: a marker at some `p > 0` followed by the length `p`.
///
/// The bytes after the last complete record of a WAL cut by a crash are a
/// prefix of one record, so they never close it with a footer.
pub fn has_commit_footer(buf: &[u8]) -> bool {
    buf.windows(FOOTER_LEN).enumerate().skip(1).any(|(p, w)| {
        w[0] == COMMIT_MARKER && u32::from_be_bytes([w[1], w[2], w[3], w[4]]) as usize == p
    })
}

enum EntryDecode {
    Entry(WalEntry, usize),
    Truncated,
    Corrupt(String),
}

fn decode_entry(buf: &[u8]) -> EntryDecode {
    let kind = buf[0];
    let mut pos = 1usize;

    macro_rules! varint {
        () => {
            match read_uvarint(&buf[pos..]) {
                Some((v, used)) => {
                    pos += used;
                    v
                }
                // A varint cut by the end of the buffer is a torn tail;
                // an overlong one with bytes after it is corruption.
                None if buf.len() - pos < crate::codec::varint::MAX_VARINT_LEN => {
                    return EntryDecode::Truncated
                }
                None => return EntryDecode::Corrupt("malformed varint".to_string()),
            }
        };
    }

    let table_id = varint!();
    let Ok(table_id) = u32::try_from(table_id) else {
        return EntryDecode::Corrupt(format!("table id {} out of range", table_id));
    };
    let reverse_mask = varint!();
    let key_count = if kind == ENTRY_SET {
        let Some(&count) = buf.get(pos) else {
            return EntryDecode::Truncated;
        };
        pos += 1;
        Some(count)
    } else {
        None
    };
    let payload_len = varint!() as usize;
    let Some(payload) = buf.get(pos..pos.saturating_add(payload_len)) else {
        return EntryDecode::Truncated;
    };
    pos += payload_len;

    let Some(row) = decode_row_value(payload) else {
        return EntryDecode::Corrupt("undecodable row payload".to_string());
    };

    let entry = match key_count {
        Some(key_count) => {
            if key_count == 0 || usize::from(key_count) > row.len() {
                return EntryDecode::Corrupt(format!(
                    "key count {} invalid for row of {} columns",
                    key_count,
                    row.len()
                ));
            }
            WalEntry::Set {
                table_id,
                reverse_mask,
                key_count,
                row,
            }
        }
        None => {
            if row.is_empty() {
                return EntryDecode::Corrupt("delete without key columns".to_string());
            }
            WalEntry::Delete {
                table_id,
                reverse_mask,
                key: row,
            }
        }
    };
    EntryDecode::Entry(entry, pos)
}
