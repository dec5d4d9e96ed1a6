//! Error types for Skein.

use crate::row::KeyTuple;
use crate::value::Value;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use thiserror::Error;

/// Result type alias for Skein operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Schema-level failures: something a statement names does not exist or
/// cannot be used the way the statement uses it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("table {database}.{table} is not defined")]
    TableNotFound { database: String, table: String },

    #[error("column {column} is not defined on {table}")]
    ColumnNotFound { table: String, column: String },

    #[error("{table}.{field} is not a foreign key")]
    ForeignKeyNotFound { table: String, field: String },

    #[error("table {table} has no primary key")]
    PrimaryKeyNotFound { table: String },

    #[error("table {table} has a composite primary key and cannot be referenced")]
    CompositePrimaryKey { table: String },

    #[error("{table}.{field} does not reference {expected}")]
    UnrelatedTables {
        table: String,
        field: String,
        expected: String,
    },

    #[error("column {column} is ambiguous across {aliases:?}")]
    AmbiguousColumn { column: String, aliases: Vec<String> },

    #[error("table alias {alias} is not part of the statement")]
    UnknownAlias { alias: String },

    #[error("invalid schema: {message}")]
    Invalid { message: String },
}

/// Error types for statement evaluation.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced table, column, key or relationship is missing or ambiguous.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A JOIN, WHERE or HAVING expression failed; `clause` is its source text.
    #[error("failed to evaluate `{clause}`: {source}")]
    ConditionEvaluation {
        clause: String,
        #[source]
        source: Box<Error>,
    },

    /// The statement is well-formed but cannot be carried out as written.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An operator received a value it cannot work with.
    #[error("type mismatch: expected {expected}, found {found:?}")]
    TypeMismatch { expected: String, found: Value },

    /// A primary or unique key collision with no duplicate handler.
    #[error("unique constraint violation on {index}: {key:?}")]
    UniqueConstraint { index: String, key: KeyTuple },

    /// Invalid operation.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a table-not-found schema error.
    pub fn table_not_found(database: impl Into<String>, table: impl Into<String>) -> Self {
        SchemaError::TableNotFound {
            database: database.into(),
            table: table.into(),
        }
        .into()
    }

    /// Creates a column-not-found schema error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        SchemaError::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
        .into()
    }

    /// Creates an invalid-schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        SchemaError::Invalid {
            message: message.into(),
        }
        .into()
    }

    /// Wraps an evaluation failure with the clause that produced it.
    pub fn condition(clause: impl Into<String>, source: Error) -> Self {
        Error::ConditionEvaluation {
            clause: clause.into(),
            source: Box::new(source),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: Value) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found,
        }
    }

    /// Creates a unique constraint error.
    pub fn unique_constraint(index: impl Into<String>, key: KeyTuple) -> Self {
        Error::UniqueConstraint {
            index: index.into(),
            key,
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the schema error behind this error, looking through
    /// condition wrappers.
    pub fn as_schema_error(&self) -> Option<&SchemaError> {
        match self {
            Error::Schema(err) => Some(err),
            Error::ConditionEvaluation { source, .. } => source.as_schema_error(),
            _ => None,
        }
    }
}
