//! Mutation executors.
//!
//! UPDATE and DELETE locate their rows with the join engine; INSERT evaluates
//! its rows up front. All three hand the writes to the store in one batch
//! per source and report the affected keys by alias.

mod delete;
mod insert;
mod update;

pub use delete::delete;
pub use insert::{insert, OnDuplicateHandler, EXCLUDED};
pub use update::update;

use crate::statement::AffectedRows;
use alloc::collections::BTreeMap;
use alloc::string::String;

/// Mutation results keyed by source alias.
pub type AffectedMap = BTreeMap<String, AffectedRows>;

#[cfg(test)]
pub(crate) mod fixtures {
    use alloc::string::String;
    use alloc::vec::Vec;
    use skein_core::schema::{SchemaCatalog, TableBuilder};
    use skein_core::{DataType, Value};
    use skein_storage::{MemoryStorage, Storage, Store};

    /// a(id, x) and b(id, a_id, y), both keyed by `id`.
    pub fn setup(a_rows: &[(i64, i64)], b_rows: &[(i64, i64, i64)]) -> (SchemaCatalog, MemoryStorage) {
        let a = TableBuilder::new("a")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("x", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], true)
            .unwrap()
            .build()
            .unwrap();
        let b = TableBuilder::new("b")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("a_id", DataType::Int64)
            .unwrap()
            .add_column("y", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], false)
            .unwrap()
            .build()
            .unwrap();
        let mut catalog = SchemaCatalog::new("main");
        catalog.register("main", a).unwrap();
        catalog.register("main", b).unwrap();
        let storage = MemoryStorage::from_catalog(&catalog);

        let cols = |names: &[&str]| names.iter().map(|n| String::from(*n)).collect::<Vec<_>>();
        storage
            .store("main", "a")
            .unwrap()
            .borrow_mut()
            .add_all(
                a_rows
                    .iter()
                    .map(|(id, x)| alloc::vec![Value::Int64(*id), Value::Int64(*x)])
                    .collect(),
                &cols(&["id", "x"]),
                None,
            )
            .unwrap();
        storage
            .store("main", "b")
            .unwrap()
            .borrow_mut()
            .add_all(
                b_rows
                    .iter()
                    .map(|(id, a_id, y)| {
                        alloc::vec![Value::Int64(*id), Value::Int64(*a_id), Value::Int64(*y)]
                    })
                    .collect(),
                &cols(&["id", "a_id", "y"]),
                None,
            )
            .unwrap();
        (catalog, storage)
    }

    /// Returns the rows of `table` in scan order.
    pub fn rows(storage: &MemoryStorage, table: &str) -> Vec<Vec<Value>> {
        storage
            .store("main", table)
            .unwrap()
            .borrow()
            .scan()
            .iter()
            .map(|r| r.values().to_vec())
            .collect()
    }
}
