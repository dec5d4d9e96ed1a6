//! Execution context for statement evaluation.

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use skein_core::schema::{SchemaCatalog, TableSchema};
use skein_core::Result;
use skein_storage::{Storage, StoreRef};

/// Execution context providing the schema catalog, the storage backing table
/// sources and the database unqualified table names resolve in.
#[derive(Clone)]
pub struct ExecutionContext<'a> {
    catalog: &'a SchemaCatalog,
    storage: &'a dyn Storage,
    database: String,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context using the catalog's default database.
    pub fn new(catalog: &'a SchemaCatalog, storage: &'a dyn Storage) -> Self {
        Self {
            catalog,
            storage,
            database: catalog.default_database().to_string(),
        }
    }

    /// Sets the database unqualified table names resolve in.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Returns the schema catalog.
    #[inline]
    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    /// Returns the storage.
    #[inline]
    pub fn storage(&self) -> &'a dyn Storage {
        self.storage
    }

    /// Returns the current database name.
    #[inline]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Looks up a table descriptor, defaulting to the current database.
    pub fn lookup(&self, database: Option<&str>, table: &str) -> Result<Arc<TableSchema>> {
        self.catalog
            .lookup(database.unwrap_or(&self.database), table)
    }

    /// Returns the store for a table, defaulting to the current database.
    pub fn store(&self, database: Option<&str>, table: &str) -> Result<StoreRef> {
        self.storage.store(database.unwrap_or(&self.database), table)
    }
}
