//! Statement dispatch and results.

use crate::ast::Statement;
use crate::context::ExecutionContext;
use crate::mutation;
use crate::select;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use skein_core::{KeyTuple, Result, Value};
use tracing::debug;

/// Rows produced by a SELECT.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    /// Output column names in field order.
    pub columns: Vec<String>,
    /// Projected rows.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the position of the first column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns the value of column `name` in row `row`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let index = self.column_index(name)?;
        self.rows.get(row)?.get(index)
    }

    /// Returns the values of column `name` in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[index].clone()).collect())
    }
}

/// Rows written by a mutation on one source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AffectedRows {
    pub count: usize,
    /// Keys of the written rows in write order.
    pub keys: Vec<KeyTuple>,
}

impl AffectedRows {
    /// Creates an entry whose count is the number of keys.
    pub fn from_keys(keys: Vec<KeyTuple>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// The outcome of a statement.
#[derive(Clone, Debug, PartialEq)]
pub enum StatementOutput {
    /// SELECT rows.
    Rows(ResultSet),
    /// Mutation results keyed by source alias.
    Affected(BTreeMap<String, AffectedRows>),
}

impl StatementOutput {
    /// Returns the rows of a SELECT.
    pub fn rows(&self) -> Option<&ResultSet> {
        match self {
            StatementOutput::Rows(rows) => Some(rows),
            StatementOutput::Affected(_) => None,
        }
    }

    /// Returns the mutation result for `alias`.
    pub fn affected(&self, alias: &str) -> Option<&AffectedRows> {
        match self {
            StatementOutput::Affected(map) => map.get(alias),
            StatementOutput::Rows(_) => None,
        }
    }

    /// Returns the total number of rows returned or written.
    pub fn count(&self) -> usize {
        match self {
            StatementOutput::Rows(rows) => rows.len(),
            StatementOutput::Affected(map) => map.values().map(|a| a.count).sum(),
        }
    }
}

impl Statement {
    /// Evaluates the statement with positional `params`.
    pub fn eval(&self, ctx: &ExecutionContext<'_>, params: &[Value]) -> Result<StatementOutput> {
        debug!(kind = self.kind(), database = ctx.database(), "statement started");
        let output = match self {
            Statement::Select(stmt) => StatementOutput::Rows(select::execute(stmt, ctx, params)?),
            Statement::Insert(stmt) => {
                StatementOutput::Affected(mutation::insert(stmt, ctx, params)?)
            }
            Statement::Update(stmt) => {
                StatementOutput::Affected(mutation::update(stmt, ctx, params)?)
            }
            Statement::Delete(stmt) => {
                StatementOutput::Affected(mutation::delete(stmt, ctx, params)?)
            }
        };
        debug!(kind = self.kind(), count = output.count(), "statement finished");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_result_set_access() {
        let result = ResultSet {
            columns: vec![String::from("id"), String::from("name")],
            rows: vec![
                vec![Value::Int64(1), Value::from("a")],
                vec![Value::Int64(2), Value::from("b")],
            ],
        };
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(1, "name"), Some(&Value::from("b")));
        assert_eq!(result.get(2, "name"), None);
        assert_eq!(
            result.column("id"),
            Some(vec![Value::Int64(1), Value::Int64(2)])
        );
        assert!(result.column("missing").is_none());
    }

    #[test]
    fn test_output_count() {
        let mut map = BTreeMap::new();
        map.insert(
            String::from("a"),
            AffectedRows::from_keys(vec![vec![Value::Int64(1)], vec![Value::Int64(2)]]),
        );
        map.insert(String::from("b"), AffectedRows::default());
        let output = StatementOutput::Affected(map);
        assert_eq!(output.count(), 2);
        assert_eq!(output.affected("a").map(|a| a.count), Some(2));
        assert!(output.rows().is_none());
    }
}
