//! Skein Storage - cursor and store contracts for the Skein query core.
//!
//! This crate provides:
//!
//! - `Cursor`: Sequential, rewindable access to a source's rows with staged writes
//! - `Store`: Batch insert/delete/update over one table's rows
//! - `MemoryStore` / `MemoryCursor`: The in-memory reference implementation
//! - `ResultStore`: Read-only rows of a derived query
//! - `Storage` / `MemoryStorage`: Store lookup by database and table name
//!
//! # Example
//!
//! ```rust
//! use skein_storage::{open_cursor, Cursor, MemoryStorage, Storage, Store};
//! use skein_core::schema::{SchemaCatalog, TableBuilder};
//! use skein_core::{DataType, Value};
//!
//! let users = TableBuilder::new("users")
//!     .unwrap()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("name", DataType::String)
//!     .unwrap()
//!     .add_primary_key(&["id"], true)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let mut catalog = SchemaCatalog::new("main");
//! catalog.register("main", users).unwrap();
//!
//! let storage = MemoryStorage::from_catalog(&catalog);
//! let store = storage.store("main", "users").unwrap();
//! let keys = store
//!     .borrow_mut()
//!     .add_all(vec![vec![Value::from("Alice")]], &["name".to_string()], None)
//!     .unwrap();
//! assert_eq!(keys, vec![vec![Value::Int64(1)]]);
//!
//! let cursor = open_cursor(&store);
//! assert_eq!(cursor.fetch().unwrap().unwrap().get(1), Some(&Value::from("Alice")));
//! ```

#![no_std]

extern crate alloc;

pub mod cursor;
pub mod memory;
pub mod result_store;
pub mod storage;
pub mod store;

pub use cursor::{Cursor, MemoryCursor};
pub use memory::MemoryStore;
pub use result_store::ResultStore;
pub use storage::{MemoryStorage, Storage};
pub use store::{open_cursor, DuplicateAction, DuplicateHandler, Store, StoreRef};
