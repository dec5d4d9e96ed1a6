//! Read-only schema catalog.
//!
//! The catalog is built once by the embedding application and handed to every
//! statement evaluation by reference; nothing in Skein mutates it.

use super::table::TableSchema;
use crate::error::{Error, Result};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

/// Catalog of table descriptors, keyed by database then table name.
#[derive(Clone, Debug, Default)]
pub struct SchemaCatalog {
    default_database: String,
    databases: BTreeMap<String, BTreeMap<String, Arc<TableSchema>>>,
}

impl SchemaCatalog {
    /// Creates an empty catalog whose unqualified names resolve in `default_database`.
    pub fn new(default_database: impl Into<String>) -> Self {
        Self {
            default_database: default_database.into(),
            databases: BTreeMap::new(),
        }
    }

    /// Returns the database unqualified table names resolve in.
    pub fn default_database(&self) -> &str {
        &self.default_database
    }

    /// Registers a table descriptor.
    pub fn register(&mut self, database: &str, schema: TableSchema) -> Result<()> {
        let tables = self.databases.entry(database.to_string()).or_default();
        if tables.contains_key(schema.name()) {
            return Err(Error::invalid_schema(format!(
                "Table already exists: {}.{}",
                database,
                schema.name()
            )));
        }
        tables.insert(schema.name().to_string(), Arc::new(schema));
        Ok(())
    }

    /// Looks up a table descriptor.
    pub fn lookup(&self, database: &str, table: &str) -> Result<Arc<TableSchema>> {
        self.databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .cloned()
            .ok_or_else(|| Error::table_not_found(database, table))
    }

    /// Iterates over the tables registered in `database`.
    pub fn tables<'a>(&'a self, database: &str) -> impl Iterator<Item = &'a Arc<TableSchema>> + 'a {
        self.databases
            .get(database)
            .into_iter()
            .flat_map(|tables| tables.values())
    }

    /// Iterates over `(database, table)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<TableSchema>)> {
        self.databases
            .iter()
            .flat_map(|(db, tables)| tables.values().map(move |t| (db.as_str(), t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableBuilder;
    use crate::{DataType, SchemaError};

    fn table(name: &str) -> TableSchema {
        TableBuilder::new(name)
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], false)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut catalog = SchemaCatalog::new("main");
        catalog.register("main", table("users")).unwrap();
        catalog.register("archive", table("users")).unwrap();

        assert_eq!(catalog.lookup("main", "users").unwrap().name(), "users");
        assert_eq!(catalog.tables("archive").count(), 1);
        assert_eq!(catalog.iter().count(), 2);
    }

    #[test]
    fn test_lookup_missing_table() {
        let catalog = SchemaCatalog::new("main");
        match catalog.lookup("main", "ghosts") {
            Err(Error::Schema(SchemaError::TableNotFound { table, .. })) => {
                assert_eq!(table, "ghosts")
            }
            other => panic!("unexpected: {:?}", other.map(|t| t.name().to_string())),
        }
    }

    #[test]
    fn test_duplicate_registration() {
        let mut catalog = SchemaCatalog::new("main");
        catalog.register("main", table("users")).unwrap();
        assert!(catalog.register("main", table("users")).is_err());
    }
}
