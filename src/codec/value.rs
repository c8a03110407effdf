//! Sparse tagged row encoding
//!
//! Layout:
//! - varint column count `n`
//! - for each non-null column `i < n`, ascending:
//!   - tag byte `(delta << 3) | type`, where `delta` is the distance
//!     from the previous non-null column (the first column counts from
//!     -1, so `delta >= 1`); a delta above 31 is written as delta field 0
//!     followed by a varint delta
//!   - payload: BOOL one byte, INT64 zigzag varint, FLOAT64 8 bytes
//!     big-endian bits, STRING/BYTES varint length then raw bytes
//!
//! NULL columns are omitted entirely.

use crate::codec::varint::{put_uvarint, put_varint, read_uvarint, read_varint};
use crate::types::{Value, MAX_COLUMNS};

const TYPE_BOOL: u8 = 1;
const TYPE_INT64: u8 = 2;
const TYPE_FLOAT64: u8 = 3;
const TYPE_STRING: u8 = 4;
const TYPE_BYTES: u8 = 5;

const TYPE_MASK: u8 = 0x07;
const MAX_INLINE_DELTA: usize = 31;

/// Encodes the first `n` columns of `row`.
///
/// # Panics
///
/// Panics if `n` exceeds `row.len()`; callers always pass a width they
/// derived from the row itself.
pub fn encode_row_value(row: &[Value], n: usize) -> Vec<u8> {
    assert!(
        n <= row.len(),
        "encode_row_value: width {} exceeds row of {} columns",
        n,
        row.len()
    );

    let mut buf = Vec::with_capacity(1 + n * 4);
    put_uvarint(&mut buf, n as u64);

    let mut previous: Option<usize> = None;
    for (i, value) in row[..n].iter().enumerate() {
        let type_tag = match value {
            Value::Null => continue,
            Value::Bool(_) => TYPE_BOOL,
            Value::Int64(_) => TYPE_INT64,
            Value::Float64(_) => TYPE_FLOAT64,
            Value::String(_) => TYPE_STRING,
            Value::Bytes(_) => TYPE_BYTES,
        };
        let delta = match previous {
            Some(p) => i - p,
            None => i + 1,
        };
        previous = Some(i);

        if delta <= MAX_INLINE_DELTA {
            buf.push(((delta as u8) << 3) | type_tag);
        } else {
            buf.push(type_tag);
            put_uvarint(&mut buf, delta as u64);
        }

        match value {
            Value::Bool(b) => buf.push(u8::from(*b)),
            Value::Int64(v) => put_varint(&mut buf, *v),
            Value::Float64(f) => buf.extend_from_slice(&f.to_bits().to_be_bytes()),
            Value::String(s) => {
                put_uvarint(&mut buf, s.len() as u64);
                buf.extend_from_slice(s.as_bytes());
            }
            Value::Bytes(b) => {
                put_uvarint(&mut buf, b.len() as u64);
                buf.extend_from_slice(b);
            }
            Value::Null => unreachable!("null columns are skipped above"),
        }
    }
    buf
}

/// Decodes a row produced by [`encode_row_value`].
///
/// Returns `None` for truncated or malformed input, or a declared column
/// count above [`MAX_COLUMNS`]. Omitted columns come back as `Value::Null`.
pub fn decode_row_value(bytes: &[u8]) -> Option<Vec<Value>> {
    decode_checked(bytes, None)
}

/// Like [`decode_row_value`], but also rejects a row whose declared column
/// count is not `width`. The count is checked before anything is allocated.
pub fn decode_row_value_with_width(bytes: &[u8], width: usize) -> Option<Vec<Value>> {
    decode_checked(bytes, Some(width))
}

fn decode_checked(bytes: &[u8], width: Option<usize>) -> Option<Vec<Value>> {
    let (count, mut pos) = read_uvarint(bytes)?;
    let count = usize::try_from(count).ok()?;
    if count > MAX_COLUMNS || width.map_or(false, |w| w != count) {
        return None;
    }
    let mut row = vec![Value::Null; count];

    let mut next: usize = 0;
    while pos < bytes.len() {
        let tag = bytes[pos];
        pos += 1;

        let mut delta = (tag >> 3) as usize;
        if delta == 0 {
            let (d, used) = read_uvarint(&bytes[pos..])?;
            pos += used;
            if d <= MAX_INLINE_DELTA as u64 {
                return None;
            }
            delta = usize::try_from(d).ok()?;
        }
        // `next` is one past the previous column, so the column index is
        // `next + delta - 1`.
        let column = next.checked_add(delta - 1)?;
        if column >= count {
            return None;
        }
        next = column + 1;

        let rest = &bytes[pos..];
        let (value, used) = match tag & TYPE_MASK {
            TYPE_BOOL => match rest.first()? {
                0 => (Value::Bool(false), 1),
                1 => (Value::Bool(true), 1),
                _ => return None,
            },
            TYPE_INT64 => {
                let (v, used) = read_varint(rest)?;
                (Value::Int64(v), used)
            }
            TYPE_FLOAT64 => {
                let raw: [u8; 8] = rest.get(..8)?.try_into().ok()?;
                (Value::Float64(f64::from_bits(u64::from_be_bytes(raw))), 8)
            }
            TYPE_STRING => {
                let (data, used) = length_prefixed(rest)?;
                (Value::String(String::from_utf8(data.to_vec()).ok()?), used)
            }
            TYPE_BYTES => {
                let (data, used) = length_prefixed(rest)?;
                (Value::Bytes(data.to_vec()), used)
            }
            _ => return None,
        };
        row[column] = value;
        pos += used;
    }
    Some(row)
}

fn length_prefixed(buf: &[u8]) -> Option<(&[u8], usize)> {
    let (len, used) = read_uvarint(buf)?;
    let len = usize::try_from(len).ok()?;
    let end = used.checked_add(len)?;
    Some((buf.get(used..end)?, end))
}
