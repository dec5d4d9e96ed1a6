//! Field definition for Skein table schemas.

use crate::types::DataType;
use crate::value::Value;
use alloc::string::String;

/// A field (column) definition in a table schema.
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    /// Field name.
    name: String,
    /// Data type of the field.
    data_type: DataType,
    /// Whether this field allows null values.
    nullable: bool,
    /// Default value used when an insert omits the field.
    default_value: Option<Value>,
    /// Referenced table when this field is a foreign key.
    references: Option<String>,
    /// Field index in the table (0-based).
    index: usize,
}

impl FieldDescriptor {
    /// Creates a new field definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default_value: None,
            references: None,
            index: 0,
        }
    }

    /// Sets whether this field is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the default value for this field.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Marks this field as a foreign key onto `table`'s primary key.
    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Returns the field name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the data type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns whether this field is nullable.
    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns the default value, if any.
    pub fn get_default(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Returns the referenced table name when this field is a foreign key.
    pub fn referenced_table(&self) -> Option<&str> {
        self.references.as_deref()
    }

    /// Returns the field position in its table.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}
