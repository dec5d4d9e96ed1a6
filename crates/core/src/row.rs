//! Row structure for Skein.
//!
//! This module defines the `Row` struct which represents a single row in a store.

use crate::value::Value;
use alloc::vec::Vec;

/// Unique identifier for a row within its store.
pub type RowId = u64;

/// Primary-key values of one row, in key column order.
pub type KeyTuple = Vec<Value>;

/// A dummy row ID used for rows that don't correspond to a stored row
/// (e.g., the rows of a derived query).
pub const DUMMY_ROW_ID: RowId = u64::MAX;

/// A row in a table or derived result.
#[derive(Clone, Debug)]
pub struct Row {
    /// Store-assigned identifier for this row.
    id: RowId,
    /// Version number for change detection. Incremented on each update.
    version: u64,
    /// Values stored in this row, indexed by column position.
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row with the given ID and values.
    /// Version defaults to 1 for new rows.
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, version: 1, values }
    }

    /// Creates a dummy row (derived query output, etc.).
    pub fn dummy(values: Vec<Value>) -> Self {
        Self::new(DUMMY_ROW_ID, values)
    }

    /// Returns the row ID.
    #[inline]
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Returns the version number.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Increments the version number and returns the new value.
    #[inline]
    pub fn increment_version(&mut self) -> u64 {
        self.version = self.version.wrapping_add(1);
        self.version
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row and returns its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Gets a value at the given column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Sets a value at the given column index.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        if index < self.values.len() {
            self.values[index] = value;
            true
        } else {
            false
        }
    }

    /// Extracts the values at `columns`, in order.
    pub fn key(&self, columns: &[usize]) -> KeyTuple {
        columns
            .iter()
            .map(|&i| self.values.get(i).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Returns the number of values in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if this is a dummy row.
    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.id == DUMMY_ROW_ID
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.values == other.values
    }
}
