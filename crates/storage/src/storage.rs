//! Store lookup by database and table name.

use crate::memory::MemoryStore;
use crate::store::{Store, StoreRef};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use skein_core::schema::{SchemaCatalog, TableSchema};
use skein_core::{Error, Result};

/// Resolves base table references to stores.
pub trait Storage {
    /// Returns the store backing `database.table`.
    fn store(&self, database: &str, table: &str) -> Result<StoreRef>;
}

/// In-memory storage: one `MemoryStore` per table.
#[derive(Default)]
pub struct MemoryStorage {
    stores: BTreeMap<(String, String), StoreRef>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store for every table in `catalog`.
    pub fn from_catalog(catalog: &SchemaCatalog) -> Self {
        let mut storage = Self::new();
        for (database, schema) in catalog.iter() {
            let store: StoreRef = Rc::new(RefCell::new(MemoryStore::new(Arc::clone(schema))));
            storage
                .stores
                .insert((database.to_string(), schema.name().to_string()), store);
        }
        storage
    }

    /// Creates a store for `schema` in `database`.
    pub fn create_store(&mut self, database: &str, schema: Arc<TableSchema>) -> Result<StoreRef> {
        let key = (database.to_string(), schema.name().to_string());
        if self.stores.contains_key(&key) {
            return Err(Error::invalid_schema(format!(
                "Store already exists: {}.{}",
                database,
                schema.name()
            )));
        }
        let store: StoreRef = Rc::new(RefCell::new(MemoryStore::new(schema)));
        self.stores.insert(key, Rc::clone(&store));
        Ok(store)
    }

    /// Returns the number of stores.
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Returns `(database, table)` for every store.
    pub fn store_names(&self) -> Vec<(&str, &str)> {
        self.stores
            .keys()
            .map(|(db, table)| (db.as_str(), table.as_str()))
            .collect()
    }

    /// Returns the total row count across all stores.
    pub fn total_row_count(&self) -> usize {
        self.stores.values().map(|s| s.borrow().len()).sum()
    }
}

impl Storage for MemoryStorage {
    fn store(&self, database: &str, table: &str) -> Result<StoreRef> {
        self.stores
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .ok_or_else(|| Error::table_not_found(database, table))
    }
}
