//! Read-only store over the rows of a derived query.

use crate::store::{DuplicateHandler, Store};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use skein_core::schema::TableSchema;
use skein_core::{Error, KeyTuple, Result, Row, Value};

/// Materialized rows of a derived source such as `(SELECT …) AS alias`.
#[derive(Debug, Default)]
pub struct ResultStore {
    columns: Vec<String>,
    rows: Vec<Rc<Row>>,
}

impl ResultStore {
    /// Creates a store over `rows`, each laid out by `columns`.
    /// Row ids are the row positions.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, values)| Rc::new(Row::new(i as u64, values)))
            .collect();
        Self { columns, rows }
    }

    fn read_only() -> Error {
        Error::validation("derived sources are read-only")
    }
}

impl Store for ResultStore {
    fn schema(&self) -> Option<&TableSchema> {
        None
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn scan(&self) -> Vec<Rc<Row>> {
        self.rows.clone()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn key_of(&self, row: &Row) -> KeyTuple {
        vec![Value::Int64(row.id() as i64)]
    }

    fn add_all(
        &mut self,
        _rows: Vec<Vec<Value>>,
        _columns: &[String],
        _on_duplicate: Option<&mut dyn DuplicateHandler>,
    ) -> Result<Vec<KeyTuple>> {
        Err(Self::read_only())
    }

    fn delete_all(&mut self, _keys: &[KeyTuple]) -> Result<usize> {
        Err(Self::read_only())
    }

    fn update_all(&mut self, _rows: Vec<Row>) -> Result<Vec<KeyTuple>> {
        Err(Self::read_only())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_store_scan() {
        let store = ResultStore::new(
            vec![String::from("id"), String::from("c1")],
            vec![
                vec![Value::Int64(1), Value::from("Acme")],
                vec![Value::Int64(2), Value::from("Initech")],
            ],
        );
        assert!(store.schema().is_none());
        assert_eq!(store.columns().len(), 2);
        let rows = store.scan();
        assert_eq!(rows[1].id(), 1);
        assert_eq!(rows[1].get(1), Some(&Value::from("Initech")));
    }

    #[test]
    fn test_result_store_rejects_writes() {
        let mut store = ResultStore::new(vec![String::from("id")], vec![vec![Value::Int64(1)]]);
        assert!(matches!(
            store.delete_all(&[vec![Value::Int64(0)]]),
            Err(Error::Validation { .. })
        ));
        assert!(store.update_all(Vec::new()).is_err());
        assert!(store.add_all(Vec::new(), &[], None).is_err());
    }
}
