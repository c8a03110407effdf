//! Order-preserving key encoding
//!
//! Each key column is written as a tag byte followed by a type-specific
//! payload. Comparing two encodings bytewise yields the same order as
//! comparing the source rows column by column under SQL ordering.
//!
//! Tag byte: column number in the high nibble, type in the low nibble.
//! Columns >= 16 are written as `0xF0`, a varint column number, and a
//! byte carrying only the type nibble (type nibble 0 is never a real
//! type, so `0xF0` cannot collide with column 15).
//!
//! | type nibble | meaning          | payload                           |
//! |-------------|------------------|-----------------------------------|
//! | 0x1         | NULL             | none                              |
//! | 0x2         | BOOL             | 0x00 / 0x01                       |
//! | 0x3         | INT64 < 0        | 8 bytes big-endian two's compl.   |
//! | 0x4         | INT64 >= 0       | 8 bytes big-endian two's compl.   |
//! | 0x5         | FLOAT64 NaN      | none                              |
//! | 0x6         | FLOAT64 < 0      | 8 bytes big-endian of `!bits`     |
//! | 0x7         | FLOAT64 zero     | none                              |
//! | 0x8         | FLOAT64 > 0      | 8 bytes big-endian of `bits`      |
//! | 0x9         | STRING           | escaped bytes, 0x00 terminator    |
//! | 0xA         | BYTES            | escaped bytes, 0x00 terminator    |
//!
//! Escaping: 0x00 becomes 0x01 0x00 and 0x01 becomes 0x01 0x01.
//!
//! A descending column has every byte of its encoding (tag included)
//! complemented, which reverses bytewise order for that column while
//! keeping the encoding prefix-free.
//!
//! This layout is persisted by durable engines. Changing it requires a
//! data migration.

use crate::codec::varint::{put_uvarint, read_uvarint};
use crate::types::{ColumnKey, Value};

pub const TAG_NULL: u8 = 0x1;
pub const TAG_BOOL: u8 = 0x2;
pub const TAG_INT_NEG: u8 = 0x3;
pub const TAG_INT_NONNEG: u8 = 0x4;
pub const TAG_FLOAT_NAN: u8 = 0x5;
pub const TAG_FLOAT_NEG: u8 = 0x6;
pub const TAG_FLOAT_ZERO: u8 = 0x7;
pub const TAG_FLOAT_POS: u8 = 0x8;
pub const TAG_STRING: u8 = 0x9;
pub const TAG_BYTES: u8 = 0xA;

/// Marker for column numbers that do not fit the tag nibble.
pub const EXTENDED_COLUMN: u8 = 0xF0;

const MAX_INLINE_COLUMN: usize = 15;
const ESCAPE: u8 = 0x01;
const TERMINATOR: u8 = 0x00;

/// Encodes the projection of `row` onto `col_keys`.
///
/// # Panics
///
/// Panics if a column key addresses a column beyond `row`.
pub fn make_key(row: &[Value], col_keys: &[ColumnKey]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(col_keys.len() * 10);
    append_key(&mut buf, row, col_keys);
    buf
}

/// Appends the key encoding of `row` onto `buf`.
pub fn append_key(buf: &mut Vec<u8>, row: &[Value], col_keys: &[ColumnKey]) {
    for key in col_keys {
        let start = buf.len();
        encode_column(buf, key.column, &row[key.column]);
        if key.reverse {
            for byte in &mut buf[start..] {
                *byte = !*byte;
            }
        }
    }
}

fn put_tag(buf: &mut Vec<u8>, column: usize, tag: u8) {
    if column <= MAX_INLINE_COLUMN {
        buf.push(((column as u8) << 4) | tag);
    } else {
        buf.push(EXTENDED_COLUMN);
        put_uvarint(buf, column as u64);
        buf.push(tag);
    }
}

fn put_escaped(buf: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        if b == TERMINATOR || b == ESCAPE {
            buf.push(ESCAPE);
        }
        buf.push(b);
    }
    buf.push(TERMINATOR);
}

fn encode_column(buf: &mut Vec<u8>, column: usize, value: &Value) {
    match value {
        Value::Null => put_tag(buf, column, TAG_NULL),
        Value::Bool(b) => {
            put_tag(buf, column, TAG_BOOL);
            buf.push(u8::from(*b));
        }
        Value::Int64(i) => {
            let tag = if *i < 0 { TAG_INT_NEG } else { TAG_INT_NONNEG };
            put_tag(buf, column, tag);
            buf.extend_from_slice(&i.to_be_bytes());
        }
        Value::Float64(f) => {
            if f.is_nan() {
                put_tag(buf, column, TAG_FLOAT_NAN);
            } else if *f == 0.0 {
                put_tag(buf, column, TAG_FLOAT_ZERO);
            } else if *f < 0.0 {
                put_tag(buf, column, TAG_FLOAT_NEG);
                buf.extend_from_slice(&(!f.to_bits()).to_be_bytes());
            } else {
                put_tag(buf, column, TAG_FLOAT_POS);
                buf.extend_from_slice(&f.to_bits().to_be_bytes());
            }
        }
        Value::String(s) => {
            put_tag(buf, column, TAG_STRING);
            put_escaped(buf, s.as_bytes());
        }
        Value::Bytes(b) => {
            put_tag(buf, column, TAG_BYTES);
            put_escaped(buf, b);
        }
    }
}

/// Decodes a key produced by [`make_key`] with the same `col_keys`.
///
/// Each decoded value is written to `dest[column]`. Returns false on
/// malformed input: truncation, unknown tags, a column number other than
/// the expected one, invalid UTF-8 in a string, trailing bytes, or a
/// `dest` too short for a column.
pub fn parse_key(bytes: &[u8], col_keys: &[ColumnKey], dest: &mut [Value]) -> bool {
    let mut reader = KeyReader { buf: bytes, pos: 0, invert: false };
    for key in col_keys {
        if key.column >= dest.len() {
            return false;
        }
        reader.invert = key.reverse;
        match reader.column(key.column) {
            Some(value) => dest[key.column] = value,
            None => return false,
        }
    }
    reader.pos == bytes.len()
}

struct KeyReader<'a> {
    buf: &'a [u8],
    pos: usize,
    invert: bool,
}

impl KeyReader<'_> {
    fn byte(&mut self) -> Option<u8> {
        let b = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(if self.invert { !b } else { b })
    }

    fn fixed8(&mut self) -> Option<[u8; 8]> {
        let mut out = [0u8; 8];
        for slot in &mut out {
            *slot = self.byte()?;
        }
        Some(out)
    }

    fn uvarint(&mut self) -> Option<u64> {
        // At most 10 bytes; decode a de-inverted copy.
        let end = (self.pos + crate::codec::varint::MAX_VARINT_LEN).min(self.buf.len());
        let window: Vec<u8> = self.buf[self.pos..end]
            .iter()
            .map(|&b| if self.invert { !b } else { b })
            .collect();
        let (value, used) = read_uvarint(&window)?;
        self.pos += used;
        Some(value)
    }

    fn escaped(&mut self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            match self.byte()? {
                TERMINATOR => return Some(out),
                ESCAPE => match self.byte()? {
                    b @ (TERMINATOR | ESCAPE) => out.push(b),
                    _ => return None,
                },
                b => out.push(b),
            }
        }
    }

    fn column(&mut self, expected: usize) -> Option<Value> {
        let first = self.byte()?;
        let (column, tag) = if first == EXTENDED_COLUMN {
            let column = usize::try_from(self.uvarint()?).ok()?;
            if column <= MAX_INLINE_COLUMN {
                return None;
            }
            let tag = self.byte()?;
            if tag > 0x0f {
                return None;
            }
            (column, tag)
        } else {
            ((first >> 4) as usize, first & 0x0f)
        };
        if column != expected {
            return None;
        }

        let value = match tag {
            TAG_NULL => Value::Null,
            TAG_BOOL => match self.byte()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                _ => return None,
            },
            TAG_INT_NEG | TAG_INT_NONNEG => {
                let i = i64::from_be_bytes(self.fixed8()?);
                if (i < 0) != (tag == TAG_INT_NEG) {
                    return None;
                }
                Value::Int64(i)
            }
            TAG_FLOAT_NAN => Value::Float64(f64::NAN),
            TAG_FLOAT_ZERO => Value::Float64(0.0),
            TAG_FLOAT_NEG => {
                let f = f64::from_bits(!u64::from_be_bytes(self.fixed8()?));
                if !(f < 0.0) {
                    return None;
                }
                Value::Float64(f)
            }
            TAG_FLOAT_POS => {
                let f = f64::from_bits(u64::from_be_bytes(self.fixed8()?));
                if !(f > 0.0) {
                    return None;
                }
                Value::Float64(f)
            }
            TAG_STRING => Value::String(String::from_utf8(self.escaped()?).ok()?),
            TAG_BYTES => Value::Bytes(self.escaped()?),
            _ => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key1(value: Value, key: ColumnKey) -> Vec<u8> {
        let mut row = vec![Value::Null; key.column + 1];
        row[key.column] = value;
        make_key(&row, &[key])
    }

    #[test]
    fn test_int_fixtures() {
        assert_eq!(
            key1(Value::Int64(1), ColumnKey::asc(0)),
            vec![0x04, 0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(
            key1(Value::Int64(-1), ColumnKey::asc(0)),
            vec![0x03, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
        assert_eq!(
            key1(Value::Int64(1), ColumnKey::desc(0)),
            vec![0xfb, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]
        );
    }

    #[test]
    fn test_float_fixtures() {
        assert_eq!(key1(Value::Float64(f64::NAN), ColumnKey::asc(0)), vec![0x05]);
        assert_eq!(key1(Value::Float64(0.0), ColumnKey::asc(0)), vec![0x07]);
        assert_eq!(key1(Value::Float64(-0.0), ColumnKey::asc(0)), vec![0x07]);
        assert_eq!(
            key1(Value::Float64(1.0), ColumnKey::asc(0)),
            vec![0x08, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            key1(Value::Float64(-1.0), ColumnKey::asc(0)),
            vec![0x06, 0x40, 0x0f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn test_string_escaping_fixture() {
        assert_eq!(
            key1(Value::from("a\u{0}b\u{1}"), ColumnKey::asc(1)),
            vec![0x19, 0x61, 0x01, 0x00, 0x62, 0x01, 0x01, 0x00]
        );
        assert_eq!(key1(Value::Bytes(vec![]), ColumnKey::asc(2)), vec![0x2a, 0x00]);
    }

    #[test]
    fn test_bool_and_null_fixtures() {
        assert_eq!(key1(Value::Bool(true), ColumnKey::asc(2)), vec![0x22, 0x01]);
        assert_eq!(key1(Value::Null, ColumnKey::asc(15)), vec![0xf1]);
        assert_eq!(key1(Value::Null, ColumnKey::desc(0)), vec![0xfe]);
    }

    #[test]
    fn test_extended_column_fixture() {
        assert_eq!(key1(Value::Null, ColumnKey::asc(16)), vec![0xf0, 0x10, 0x01]);
        assert_eq!(
            key1(Value::Bool(false), ColumnKey::asc(300)),
            vec![0xf0, 0xac, 0x02, 0x02, 0x00]
        );
    }

    #[test]
    fn test_parse_round_trip_extended_and_reverse() {
        let mut row = vec![Value::Null; 20];
        row[0] = Value::from("zz");
        row[17] = Value::Int64(-42);
        row[19] = Value::Bytes(vec![0, 1, 2]);
        let keys = [ColumnKey::desc(17), ColumnKey::asc(0), ColumnKey::desc(19)];
        let encoded = make_key(&row, &keys);

        let mut dest = vec![Value::Null; 20];
        assert!(parse_key(&encoded, &keys, &mut dest));
        assert_eq!(dest[0], row[0]);
        assert_eq!(dest[17], row[17]);
        assert_eq!(dest[19], row[19]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let keys = [ColumnKey::asc(0)];
        let mut dest = vec![Value::Null];
        // truncated int payload
        assert!(!parse_key(&[0x04, 0, 0], &keys, &mut dest));
        // unknown type nibble
        assert!(!parse_key(&[0x0c], &keys, &mut dest));
        // wrong column number
        assert!(!parse_key(&[0x11], &keys, &mut dest));
        // unterminated string
        assert!(!parse_key(&[0x09, b'a'], &keys, &mut dest));
        // bad escape
        assert!(!parse_key(&[0x09, 0x01, 0x05, 0x00], &keys, &mut dest));
        // trailing bytes
        assert!(!parse_key(&[0x01, 0x01], &keys, &mut dest));
        // sign tag disagrees with payload
        assert!(!parse_key(&[0x03, 0, 0, 0, 0, 0, 0, 0, 1], &keys, &mut dest));
        // destination too short
        assert!(!parse_key(&[0x11], &[ColumnKey::asc(1)], &mut dest));
    }

    #[test]
    fn test_shorter_string_sorts_first() {
        let ab = key1(Value::from("ab"), ColumnKey::asc(0));
        let abc = key1(Value::from("abc"), ColumnKey::asc(0));
        let ab_nul = key1(Value::from("ab\u{0}"), ColumnKey::asc(0));
        assert!(ab < ab_nul);
        assert!(ab_nul < abc);

        let ab_desc = key1(Value::from("ab"), ColumnKey::desc(0));
        let abc_desc = key1(Value::from("abc"), ColumnKey::desc(0));
        assert!(abc_desc < ab_desc);
    }
}
