//! Table definitions supplied by the catalog at table-open time
//!
//! A `TableDef` fixes the stored row layout: primary-key columns first,
//! in key order, followed by the remaining columns in declaration order.
//! Every row handed to the storage layer is permuted into that layout so
//! the leading `key_count()` values of a stored row form its key.

use std::collections::HashSet;

use thiserror::Error;

use super::value::{ColumnType, Value};

/// Maximum number of primary-key columns (one reverse bit per column).
pub const MAX_KEY_COLUMNS: usize = 64;

/// Maximum number of columns in a table, and so in any encoded row.
pub const MAX_COLUMNS: usize = 4096;

/// One component of a composite ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnKey {
    /// Column index in the row being encoded.
    pub column: usize,
    /// Descending order when set.
    pub reverse: bool,
}

impl ColumnKey {
    pub fn new(column: usize, reverse: bool) -> Self {
        Self { column, reverse }
    }

    /// Ascending key component.
    pub fn asc(column: usize) -> Self {
        Self::new(column, false)
    }

    /// Descending key component.
    pub fn desc(column: usize) -> Self {
        Self::new(column, true)
    }
}

/// Errors raised while building a table definition or checking a row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableDefError {
    #[error("table {0} declares no columns")]
    NoColumns(String),

    #[error("table {0} declares no primary key")]
    NoPrimaryKey(String),

    #[error("table {table}: {count} columns (max {MAX_COLUMNS})")]
    TooManyColumns { table: String, count: usize },

    #[error("table {table}: primary key has {count} columns (max {MAX_KEY_COLUMNS})")]
    TooManyKeyColumns { table: String, count: usize },

    #[error("table {table}: primary key references column {column} of {width}")]
    KeyColumnOutOfRange {
        table: String,
        column: usize,
        width: usize,
    },

    #[error("table {table}: column {column} appears twice in the primary key")]
    DuplicateKeyColumn { table: String, column: usize },

    #[error("table {table}: expected {expected} values, got {actual}")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("table {table}: column {column} expects {expected}, got {actual}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },

    #[error("table {table}: key column {column} cannot be NULL")]
    NullKey { table: String, column: String },
}

/// Schema of one table as seen by the storage core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    table_id: u32,
    columns: Vec<String>,
    types: Vec<ColumnType>,
    primary_key: Vec<ColumnKey>,
    reverse_mask: u64,
    /// `permutation[stored_index] = user_index`
    permutation: Vec<usize>,
    /// `inverse[user_index] = stored_index`
    inverse: Vec<usize>,
    stored_keys: Vec<ColumnKey>,
}

impl TableDef {
    /// Builds a table definition and derives its stored layout.
    pub fn new(
        name: impl Into<String>,
        table_id: u32,
        columns: Vec<(String, ColumnType)>,
        primary_key: Vec<ColumnKey>,
    ) -> Result<Self, TableDefError> {
        let name = name.into();
        if columns.is_empty() {
            return Err(TableDefError::NoColumns(name));
        }
        if primary_key.is_empty() {
            return Err(TableDefError::NoPrimaryKey(name));
        }
        if columns.len() > MAX_COLUMNS {
            return Err(TableDefError::TooManyColumns {
                table: name,
                count: columns.len(),
            });
        }
        if primary_key.len() > MAX_KEY_COLUMNS {
            return Err(TableDefError::TooManyKeyColumns {
                table: name,
                count: primary_key.len(),
            });
        }

        let width = columns.len();
        let mut seen = HashSet::new();
        let mut reverse_mask = 0u64;
        for (i, key) in primary_key.iter().enumerate() {
            if key.column >= width {
                return Err(TableDefError::KeyColumnOutOfRange {
                    table: name,
                    column: key.column,
                    width,
                });
            }
            if !seen.insert(key.column) {
                return Err(TableDefError::DuplicateKeyColumn {
                    table: name,
                    column: key.column,
                });
            }
            if key.reverse {
                reverse_mask |= 1 << i;
            }
        }

        let mut permutation: Vec<usize> = primary_key.iter().map(|k| k.column).collect();
        permutation.extend((0..width).filter(|c| !seen.contains(c)));

        let mut inverse = vec![0; width];
        for (stored, &user) in permutation.iter().enumerate() {
            inverse[user] = stored;
        }

        let stored_keys = primary_key
            .iter()
            .enumerate()
            .map(|(i, k)| ColumnKey::new(i, k.reverse))
            .collect();

        let (columns, types) = columns.into_iter().unzip();

        Ok(Self {
            name,
            table_id,
            columns,
            types,
            primary_key,
            reverse_mask,
            permutation,
            inverse,
            stored_keys,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn primary_key(&self) -> &[ColumnKey] {
        &self.primary_key
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn key_count(&self) -> usize {
        self.primary_key.len()
    }

    /// Bit i is set when key column i sorts descending.
    pub fn reverse_mask(&self) -> u64 {
        self.reverse_mask
    }

    /// Column keys addressing the leading key columns of a stored row.
    pub fn stored_keys(&self) -> &[ColumnKey] {
        &self.stored_keys
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Reorders a row from declaration order into stored order.
    pub fn to_stored(&self, row: &[Value]) -> Vec<Value> {
        self.permutation.iter().map(|&c| row[c].clone()).collect()
    }

    /// Reorders a stored row back into declaration order.
    pub fn to_user(&self, stored: &[Value]) -> Vec<Value> {
        self.inverse.iter().map(|&s| stored[s].clone()).collect()
    }

    /// Extracts the primary-key values of a declaration-order row.
    pub fn key_of(&self, row: &[Value]) -> Vec<Value> {
        self.primary_key
            .iter()
            .map(|k| row[k.column].clone())
            .collect()
    }

    /// Checks arity, column types, and non-null key columns.
    pub fn check_row(&self, row: &[Value]) -> Result<(), TableDefError> {
        if row.len() != self.width() {
            return Err(TableDefError::Arity {
                table: self.name.clone(),
                expected: self.width(),
                actual: row.len(),
            });
        }
        for (i, value) in row.iter().enumerate() {
            match value.column_type() {
                Some(actual) if actual != self.types[i] => {
                    return Err(TableDefError::TypeMismatch {
                        table: self.name.clone(),
                        column: self.columns[i].clone(),
                        expected: self.types[i],
                        actual,
                    })
                }
                Some(_) => {}
                None => {
                    if self.primary_key.iter().any(|k| k.column == i) {
                        return Err(TableDefError::NullKey {
                            table: self.name.clone(),
                            column: self.columns[i].clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks a primary-key tuple against the key column types.
    pub fn check_key(&self, key: &[Value]) -> Result<(), TableDefError> {
        if key.len() != self.key_count() {
            return Err(TableDefError::Arity {
                table: self.name.clone(),
                expected: self.key_count(),
                actual: key.len(),
            });
        }
        for (value, k) in key.iter().zip(&self.primary_key) {
            let column = self.columns[k.column].clone();
            match value.column_type() {
                None => {
                    return Err(TableDefError::NullKey {
                        table: self.name.clone(),
                        column,
                    })
                }
                Some(actual) if actual != self.types[k.column] => {
                    return Err(TableDefError::TypeMismatch {
                        table: self.name.clone(),
                        column,
                        expected: self.types[k.column],
                        actual,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> TableDef {
        TableDef::new(
            "accounts",
            7,
            vec![
                ("name".to_string(), ColumnType::String),
                ("id".to_string(), ColumnType::Int64),
                ("region".to_string(), ColumnType::String),
            ],
            vec![ColumnKey::asc(1), ColumnKey::desc(2)],
        )
        .unwrap()
    }

    #[test]
    fn test_permutation_puts_key_columns_first() {
        let def = accounts();
        assert_eq!(def.permutation(), &[1, 2, 0]);
        assert_eq!(def.reverse_mask(), 0b10);
        assert_eq!(
            def.stored_keys(),
            &[ColumnKey::asc(0), ColumnKey::desc(1)]
        );
    }

    #[test]
    fn test_stored_round_trip() {
        let def = accounts();
        let row = vec![Value::from("ann"), Value::Int64(4), Value::from("eu")];
        let stored = def.to_stored(&row);
        assert_eq!(stored, vec![Value::Int64(4), Value::from("eu"), Value::from("ann")]);
        assert_eq!(def.to_user(&stored), row);
        assert_eq!(def.key_of(&row), vec![Value::Int64(4), Value::from("eu")]);
    }

    #[test]
    fn test_rejects_duplicate_key_column() {
        let result = TableDef::new(
            "t",
            1,
            vec![("a".to_string(), ColumnType::Int64)],
            vec![ColumnKey::asc(0), ColumnKey::desc(0)],
        );
        assert!(matches!(result, Err(TableDefError::DuplicateKeyColumn { .. })));
    }

    #[test]
    fn test_rejects_too_many_columns() {
        let columns = (0..=MAX_COLUMNS)
            .map(|i| (format!("c{i}"), ColumnType::Int64))
            .collect();
        let result = TableDef::new("wide", 1, columns, vec![ColumnKey::asc(0)]);
        assert!(matches!(
            result,
            Err(TableDefError::TooManyColumns { count, .. }) if count == MAX_COLUMNS + 1
        ));
    }

    #[test]
    fn test_rejects_out_of_range_key() {
        let result = TableDef::new(
            "t",
            1,
            vec![("a".to_string(), ColumnType::Int64)],
            vec![ColumnKey::asc(3)],
        );
        assert!(matches!(result, Err(TableDefError::KeyColumnOutOfRange { .. })));
    }

    #[test]
    fn test_check_row() {
        let def = accounts();
        assert!(def
            .check_row(&[Value::Null, Value::Int64(1), Value::from("x")])
            .is_ok());
        assert!(matches!(
            def.check_row(&[Value::Null, Value::Null, Value::from("x")]),
            Err(TableDefError::NullKey { .. })
        ));
        assert!(matches!(
            def.check_row(&[Value::Null, Value::from("1"), Value::from("x")]),
            Err(TableDefError::TypeMismatch { .. })
        ));
        assert!(matches!(
            def.check_row(&[Value::Null]),
            Err(TableDefError::Arity { .. })
        ));
    }
}
