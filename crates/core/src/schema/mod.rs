//! Schema module for Skein.
//!
//! This module contains the read-only schema descriptors consulted during
//! statement evaluation: fields, tables and the catalog that indexes them.

mod catalog;
mod field;
mod table;

pub use catalog::SchemaCatalog;
pub use field::FieldDescriptor;
pub use table::{TableBuilder, TableSchema};
