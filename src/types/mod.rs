//! Row data model shared by the codecs and the transaction engine
//!
//! This module provides:
//! - `Value` - closed set of column values with SQL ordering
//! - `ColumnType` - declared column types
//! - `ColumnKey` - one (column, direction) component of an ordering key
//! - `TableDef` - table schema and stored row layout

mod table;
mod value;

pub use table::{ColumnKey, TableDef, TableDefError, MAX_COLUMNS, MAX_KEY_COLUMNS};
pub use value::{ColumnType, Value};
