//! Data type definitions for Skein.
//!
//! This module defines the data types a schema field can declare.

/// Supported data types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type (true/false)
    Boolean,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
}

impl DataType {
    /// Returns whether this type is an integer type (usable for auto-increment keys).
    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::DateTime)
    }

    /// Returns whether arithmetic applies to this type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }

    /// Returns whether this type can be part of a key.
    pub fn is_indexable(&self) -> bool {
        !matches!(self, DataType::Bytes)
    }
}
