//! Skein Core - values, rows, errors and schema descriptors for the Skein query core.
//!
//! This crate provides the foundational types shared by storage and query evaluation:
//!
//! - `DataType`: Supported data types (Boolean, Int64, Float64, String, DateTime, Bytes)
//! - `Value`: Runtime values held in rows and produced by expressions
//! - `Row`: A row of values with a store-assigned identifier
//! - `schema`: Table descriptors, the `TableBuilder` and the read-only `SchemaCatalog`
//! - `Error`: The error taxonomy every statement evaluation reports through
//!
//! # Example
//!
//! ```rust
//! use skein_core::{DataType, Value, Row};
//! use skein_core::schema::{SchemaCatalog, TableBuilder};
//!
//! let orgs = TableBuilder::new("orgs")
//!     .unwrap()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("name", DataType::String)
//!     .unwrap()
//!     .add_primary_key(&["id"], true)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let mut catalog = SchemaCatalog::new("main");
//! catalog.register("main", orgs).unwrap();
//! assert_eq!(catalog.lookup("main", "orgs").unwrap().primary_key(), &["id"]);
//!
//! let row = Row::new(1, vec![Value::Int64(1), Value::String("Acme".into())]);
//! assert_eq!(row.get(1), Some(&Value::String("Acme".into())));
//! ```

#![no_std]

extern crate alloc;

mod error;
pub mod pattern_match;
mod row;
pub mod schema;
mod types;
mod value;

pub use error::{Error, Result, SchemaError};
pub use row::{KeyTuple, Row, RowId, DUMMY_ROW_ID};
pub use types::DataType;
pub use value::Value;
