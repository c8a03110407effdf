//! Binary codecs for keys and row values
//!
//! - `key` - order-preserving encoding of key projections
//! - `value` - compact sparse encoding of whole rows
//! - `varint` - base-128 varints and zigzag mapping
//!
//! Codecs never return errors: malformed input yields `None` / `false`
//! and callers report it as corruption.

pub mod key;
pub mod value;
pub mod varint;

pub use key::{append_key, make_key, parse_key};
pub use value::{decode_row_value, decode_row_value_with_width, encode_row_value};
pub use varint::{put_uvarint, read_uvarint, zigzag_decode, zigzag_encode};
