//! Table descriptor for Skein schemas.

use super::field::FieldDescriptor;
use crate::error::{Error, Result, SchemaError};
use crate::types::DataType;
use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// A table definition in the schema catalog.
#[derive(Clone, Debug)]
pub struct TableSchema {
    /// Table name.
    name: String,
    /// Field definitions, in declaration order.
    fields: Vec<FieldDescriptor>,
    /// Primary key columns (empty if the table has none).
    primary_key: Vec<String>,
    /// Unique keys: name → columns.
    unique_keys: BTreeMap<String, Vec<String>>,
    /// Whether the store generates primary key values.
    auto_increment: bool,
    /// Storage engine name.
    engine: String,
}

impl TableSchema {
    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields in declaration order.
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns the field names in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name().to_string()).collect()
    }

    /// Gets a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Gets a field index by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Returns the primary key columns.
    #[inline]
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Returns the primary key column positions.
    pub fn primary_key_indices(&self) -> Vec<usize> {
        self.primary_key
            .iter()
            .filter_map(|c| self.field_index(c))
            .collect()
    }

    /// Returns the single primary key column, the only kind a foreign key can reference.
    pub fn single_primary_key(&self) -> Result<&str> {
        match self.primary_key.as_slice() {
            [] => Err(SchemaError::PrimaryKeyNotFound {
                table: self.name.clone(),
            }
            .into()),
            [column] => Ok(column),
            _ => Err(SchemaError::CompositePrimaryKey {
                table: self.name.clone(),
            }
            .into()),
        }
    }

    /// Returns the table `field` references, failing if it is not a foreign key.
    pub fn foreign_key(&self, field: &str) -> Result<&str> {
        let descriptor = self
            .field(field)
            .ok_or_else(|| Error::column_not_found(&self.name, field))?;
        descriptor.referenced_table().ok_or_else(|| {
            SchemaError::ForeignKeyNotFound {
                table: self.name.clone(),
                field: field.to_string(),
            }
            .into()
        })
    }

    /// Returns the unique keys.
    #[inline]
    pub fn unique_keys(&self) -> &BTreeMap<String, Vec<String>> {
        &self.unique_keys
    }

    /// Returns whether the store generates primary key values.
    #[inline]
    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Returns the storage engine name.
    #[inline]
    pub fn engine(&self) -> &str {
        &self.engine
    }
}

/// Builder for creating table descriptors.
pub struct TableBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
    primary_key: Vec<String>,
    unique_keys: BTreeMap<String, Vec<String>>,
    auto_increment: bool,
    engine: String,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            fields: Vec::new(),
            primary_key: Vec::new(),
            unique_keys: BTreeMap::new(),
            auto_increment: false,
            engine: String::from("memory"),
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let mut chars = name.chars();
        match chars.next() {
            None => return Err(Error::invalid_schema("Name cannot be empty")),
            Some(first) if !first.is_ascii_alphabetic() && first != '_' => {
                return Err(Error::invalid_schema(format!(
                    "Name must start with letter or underscore: {}",
                    name
                )));
            }
            Some(_) => {}
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    fn require_column(&self, name: &str) -> Result<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| Error::invalid_schema(format!("Column not found: {}", name)))
    }

    /// Adds a column to the table.
    pub fn add_column(self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        self.add_field(FieldDescriptor::new(name, data_type))
    }

    /// Adds a fully described field.
    pub fn add_field(mut self, field: FieldDescriptor) -> Result<Self> {
        Self::check_naming_rules(field.name())?;
        if self.fields.iter().any(|f| f.name() == field.name()) {
            return Err(Error::invalid_schema(format!(
                "Column already exists: {}",
                field.name()
            )));
        }
        self.fields.push(field);
        Ok(self)
    }

    /// Marks columns as not nullable.
    pub fn add_not_null(mut self, columns: &[&str]) -> Self {
        for name in columns {
            if let Some(field) = self.fields.iter_mut().find(|f| f.name() == *name) {
                *field = field.clone().nullable(false);
            }
        }
        self
    }

    /// Sets a column default.
    pub fn add_default(mut self, column: &str, value: Value) -> Result<Self> {
        self.require_column(column)?;
        if let Some(field) = self.fields.iter_mut().find(|f| f.name() == column) {
            *field = field.clone().default_value(value);
        }
        Ok(self)
    }

    /// Sets the primary key.
    pub fn add_primary_key(mut self, columns: &[&str], auto_increment: bool) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::invalid_schema("Primary key needs at least one column"));
        }
        for name in columns {
            let field = self.require_column(name)?;
            if !field.data_type().is_indexable() {
                return Err(Error::invalid_schema(format!(
                    "Column is not indexable: {}",
                    name
                )));
            }
        }
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self.auto_increment = auto_increment;
        Ok(self)
    }

    /// Adds a unique key.
    pub fn add_unique(mut self, name: impl Into<String>, columns: &[&str]) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        for column in columns {
            self.require_column(column)?;
        }
        self.unique_keys
            .insert(name, columns.iter().map(|c| c.to_string()).collect());
        Ok(self)
    }

    /// Marks `column` as a foreign key onto `parent_table`'s primary key.
    pub fn add_foreign_key(mut self, column: &str, parent_table: &str) -> Result<Self> {
        Self::check_naming_rules(parent_table)?;
        self.require_column(column)?;
        if let Some(field) = self.fields.iter_mut().find(|f| f.name() == column) {
            *field = field.clone().references(parent_table);
        }
        Ok(self)
    }

    /// Sets the storage engine name.
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Builds the table descriptor.
    pub fn build(self) -> Result<TableSchema> {
        if self.auto_increment {
            let [column] = self.primary_key.as_slice() else {
                return Err(Error::invalid_schema(format!(
                    "Auto-increment requires a single-column primary key on {}",
                    self.name
                )));
            };
            let field = self.require_column(column)?;
            if !field.data_type().is_integer() {
                return Err(Error::invalid_schema("Auto-increment requires integer type"));
            }
        }

        let fields = self
            .fields
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.with_index(i))
            .collect();

        Ok(TableSchema {
            name: self.name,
            fields,
            primary_key: self.primary_key,
            unique_keys: self.unique_keys,
            auto_increment: self.auto_increment,
            engine: self.engine,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSchema {
        TableBuilder::new("users")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("email", DataType::String)
            .unwrap()
            .add_column("org_id", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], true)
            .unwrap()
            .add_unique("uq_email", &["email"])
            .unwrap()
            .add_foreign_key("org_id", "orgs")
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_table_builder() {
        let table = users();
        assert_eq!(table.name(), "users");
        assert_eq!(table.fields().len(), 3);
        assert_eq!(table.primary_key(), &["id"]);
        assert_eq!(table.primary_key_indices(), alloc::vec![0]);
        assert!(table.auto_increment());
        assert_eq!(table.engine(), "memory");
        assert_eq!(table.unique_keys()["uq_email"], alloc::vec![String::from("email")]);
    }

    #[test]
    fn test_foreign_key_lookup() {
        let table = users();
        assert_eq!(table.foreign_key("org_id").unwrap(), "orgs");
        assert!(matches!(
            table.foreign_key("email"),
            Err(Error::Schema(SchemaError::ForeignKeyNotFound { .. }))
        ));
        assert!(matches!(
            table.foreign_key("nope"),
            Err(Error::Schema(SchemaError::ColumnNotFound { .. }))
        ));
    }

    #[test]
    fn test_auto_increment_requires_single_key() {
        let result = TableBuilder::new("pairs")
            .unwrap()
            .add_column("a", DataType::Int64)
            .unwrap()
            .add_column("b", DataType::Int64)
            .unwrap()
            .add_primary_key(&["a", "b"], true)
            .unwrap()
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_single_primary_key_errors() {
        let keyless = TableBuilder::new("logs")
            .unwrap()
            .add_column("line", DataType::String)
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(
            keyless.single_primary_key(),
            Err(Error::Schema(SchemaError::PrimaryKeyNotFound { .. }))
        ));
    }

    #[test]
    fn test_invalid_column_name() {
        let result = TableBuilder::new("test")
            .unwrap()
            .add_column("123invalid", DataType::Int64);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_column() {
        let result = TableBuilder::new("test")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("id", DataType::Int64);
        assert!(result.is_err());
    }
}
