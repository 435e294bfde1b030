//! Tabular result representation.

use crate::error::TypeError;
use crate::from_value::FromValue;
use crate::value::Value;

/// A decoded tabular result: column names plus rows of typed values.
///
/// Column order is wire order, and every row holds exactly one value per
/// column; the constructor enforces this, so a `Rowset` can never be
/// ragged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rowset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Rowset {
    /// Build a row set, validating that every row matches the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, TypeError> {
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TypeError::RowArity {
                    row: index,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Column names in wire order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows, each holding one value per column.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Find the index of a named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Borrow the value at a given row and column.
    #[must_use]
    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Extract a typed value at a given row and column.
    pub fn get<T: FromValue>(&self, row: usize, column: usize) -> Result<T, TypeError> {
        let value = self
            .value(row, column)
            .ok_or(TypeError::NoSuchCell { row, column })?;
        T::from_value(value)
    }

    /// Extract a typed value at a given row by column name.
    pub fn get_by_name<T: FromValue>(&self, row: usize, name: &str) -> Result<T, TypeError> {
        let column = self
            .column_index(name)
            .ok_or_else(|| TypeError::UnknownColumn(name.to_owned()))?;
        self.get(row, column)
    }
}
