//! AST module for expressions and statements.
//!
//! Every node implements `Display`, rendering SQL text used in diagnostics and
//! as the canonical form of window specifications.

mod expr;
mod statement;

pub use expr::{
    AggregateFunc, BinaryOp, ColumnRef, Expr, OrderBy, Over, SortOrder, UnaryOp, WindowSpec,
};
pub use statement::{
    Assignment, DeleteStatement, Field, InsertStatement, InsertValues, Join, JoinCondition,
    JoinType, Limit, OnDuplicate, SelectStatement, Statement, TableSource, UpdateStatement,
    UsingClause,
};
