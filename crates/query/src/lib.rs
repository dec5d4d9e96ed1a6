//! Skein Query - statement evaluation over cursor-backed stores.
//!
//! This crate provides:
//!
//! - `ast`: Expression and statement AST definitions
//! - `path`: Arrow reference (`org_id~>name`) resolution into smart joins
//! - `compose`: Row compositions, one sub-row per source plus the `$` projection slot
//! - `engine`: The join cursor engine (INNER/LEFT/RIGHT/FULL over cursors)
//! - `eval` / `aggregate`: Expression and aggregate function evaluation
//! - `select`: The SELECT pipeline (grouping, HAVING, windows, ordering, DISTINCT, LIMIT)
//! - `mutation`: INSERT, UPDATE and DELETE executors
//! - `statement`: Statement dispatch and results
//! - `context`: Execution context
//!
//! # Example
//!
//! ```rust
//! use skein_query::ast::{Expr, InsertStatement, SelectStatement, Statement, TableSource};
//! use skein_query::context::ExecutionContext;
//! use skein_core::schema::{SchemaCatalog, TableBuilder};
//! use skein_core::{DataType, Value};
//! use skein_storage::MemoryStorage;
//!
//! let orgs = TableBuilder::new("orgs")
//!     .unwrap()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("name", DataType::String)
//!     .unwrap()
//!     .add_primary_key(&["id"], false)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let users = TableBuilder::new("users")
//!     .unwrap()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("org_id", DataType::Int64)
//!     .unwrap()
//!     .add_primary_key(&["id"], false)
//!     .unwrap()
//!     .add_foreign_key("org_id", "orgs")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let mut catalog = SchemaCatalog::new("main");
//! catalog.register("main", orgs).unwrap();
//! catalog.register("main", users).unwrap();
//! let storage = MemoryStorage::from_catalog(&catalog);
//! let ctx = ExecutionContext::new(&catalog, &storage);
//!
//! let insert: Statement = InsertStatement::values(
//!     TableSource::table("orgs"),
//!     &["id", "name"],
//!     vec![vec![Expr::literal(1i64), Expr::literal("acme")]],
//! )
//! .into();
//! insert.eval(&ctx, &[]).unwrap();
//! let insert: Statement = InsertStatement::values(
//!     TableSource::table("users"),
//!     &["id", "org_id"],
//!     vec![vec![Expr::literal(7i64), Expr::literal(1i64)]],
//! )
//! .into();
//! insert.eval(&ctx, &[]).unwrap();
//!
//! let query: Statement = SelectStatement::new(TableSource::table("users"))
//!     .field(Expr::col("id"))
//!     .field(Expr::path("org_id~>name"))
//!     .into();
//! let output = query.eval(&ctx, &[]).unwrap();
//! let rows = output.rows().unwrap();
//! assert_eq!(rows.columns, vec!["id", "org_id~>name"]);
//! assert_eq!(rows.get(0, "org_id~>name"), Some(&Value::from("acme")));
//! ```

#![no_std]

extern crate alloc;

pub mod aggregate;
pub mod ast;
pub mod compose;
pub mod context;
pub mod engine;
pub mod eval;
pub mod mutation;
pub mod path;
pub mod select;
mod source;
pub mod statement;

pub use context::ExecutionContext;
pub use engine::{JoinCursorEngine, JoinMatchState};
pub use statement::{AffectedRows, ResultSet, StatementOutput};
