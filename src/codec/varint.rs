//! Base-128 varints and zigzag mapping
//!
//! Layout is the protobuf one: seven payload bits per byte, least
//! significant group first, high bit set on every byte except the last.

/// Longest encoding of a u64.
pub const MAX_VARINT_LEN: usize = 10;

/// Appends `value` as an unsigned varint.
pub fn put_uvarint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Reads an unsigned varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` when
/// the buffer ends mid-varint or the encoding overflows a u64.
pub fn read_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return None;
        }
        // The tenth byte may only carry the final bit.
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte < 0x80 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

/// Maps signed integers onto unsigned ones so small magnitudes stay small.
#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Appends a zigzag-mapped signed varint.
pub fn put_varint(buf: &mut Vec<u8>, value: i64) {
    put_uvarint(buf, zigzag_encode(value));
}

/// Reads a zigzag-mapped signed varint.
pub fn read_varint(buf: &[u8]) -> Option<(i64, usize)> {
    read_uvarint(buf).map(|(v, n)| (zigzag_decode(v), n))
}
