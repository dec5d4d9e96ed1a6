//! Sequential cursors over a store.
//!
//! A cursor over `n` rows has positions `0..n`: positions `0..n-1` hold rows
//! and position `n` is end-of-data. `next()` at end-of-data is a no-op; the
//! join engine decides what exhaustion means for its chain.

use crate::store::StoreRef;
use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use skein_core::{KeyTuple, Result, Row, RowId};
use tracing::trace;

/// Stateful, sequential access to the rows of one source.
pub trait Cursor {
    /// Returns the row at the current position, or `None` at end-of-data.
    fn fetch(&self) -> Result<Option<Rc<Row>>>;

    /// Advances one position.
    fn next(&mut self) -> Result<()>;

    /// Returns true at end-of-data.
    fn eof(&self) -> bool;

    /// Returns the current position. Positions are stable for the lifetime
    /// of the cursor and increase monotonically between rewinds.
    fn position(&self) -> usize;

    /// Moves back to the first row.
    fn rewind(&mut self) -> Result<()>;

    /// Stages a replacement for a row previously fetched from this cursor.
    fn stage(&mut self, row: Row) -> Result<()>;

    /// Persists staged rows and returns their keys.
    fn sync(&mut self) -> Result<Vec<KeyTuple>>;
}

/// Cursor over a snapshot of a store's rows, taken when the cursor opens.
pub struct MemoryCursor {
    store: StoreRef,
    rows: Vec<Rc<Row>>,
    position: usize,
    staged: Vec<Row>,
    staged_index: HashMap<RowId, usize>,
}

impl MemoryCursor {
    /// Creates a cursor over `rows`, writing staged rows back into `store`.
    pub fn new(store: StoreRef, rows: Vec<Rc<Row>>) -> Self {
        Self {
            store,
            rows,
            position: 0,
            staged: Vec::new(),
            staged_index: HashMap::new(),
        }
    }

    /// Returns the number of rows in the snapshot.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Cursor for MemoryCursor {
    fn fetch(&self) -> Result<Option<Rc<Row>>> {
        Ok(self.rows.get(self.position).cloned())
    }

    fn next(&mut self) -> Result<()> {
        if self.position < self.rows.len() {
            self.position += 1;
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        self.position >= self.rows.len()
    }

    fn position(&self) -> usize {
        self.position
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }

    fn stage(&mut self, row: Row) -> Result<()> {
        // The same row can surface in several compositions; the last stage wins.
        match self.staged_index.get(&row.id()) {
            Some(&slot) => self.staged[slot] = row,
            None => {
                self.staged_index.insert(row.id(), self.staged.len());
                self.staged.push(row);
            }
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<Vec<KeyTuple>> {
        if self.staged.is_empty() {
            return Ok(Vec::new());
        }
        let rows = core::mem::take(&mut self.staged);
        self.staged_index.clear();
        trace!(rows = rows.len(), "syncing staged rows");
        self.store.borrow_mut().update_all(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{open_cursor, Store};
    use alloc::string::String;
    use alloc::sync::Arc;
    use alloc::vec;
    use core::cell::RefCell;
    use skein_core::schema::TableBuilder;
    use skein_core::{DataType, Value};

    fn store_with(n: i64) -> StoreRef {
        let schema = TableBuilder::new("items")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("label", DataType::String)
            .unwrap()
            .add_primary_key(&["id"], false)
            .unwrap()
            .build()
            .unwrap();
        let mut store = MemoryStore::new(Arc::new(schema));
        let columns = vec![String::from("id"), String::from("label")];
        let rows = (1..=n)
            .map(|i| vec![Value::Int64(i), Value::String(alloc::format!("item{}", i))])
            .collect();
        store.add_all(rows, &columns, None).unwrap();
        Rc::new(RefCell::new(store))
    }

    #[test]
    fn test_positions_and_eof() {
        let store = store_with(2);
        let mut cursor = open_cursor(&store);
        assert_eq!(cursor.position(), 0);
        assert!(!cursor.eof());
        assert_eq!(cursor.fetch().unwrap().unwrap().get(0), Some(&Value::Int64(1)));

        cursor.next().unwrap();
        cursor.next().unwrap();
        assert!(cursor.eof());
        assert_eq!(cursor.position(), 2);
        assert!(cursor.fetch().unwrap().is_none());

        // next() at end-of-data stays put
        cursor.next().unwrap();
        assert_eq!(cursor.position(), 2);

        cursor.rewind().unwrap();
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_empty_cursor_starts_at_eof() {
        let store = store_with(0);
        let cursor = open_cursor(&store);
        assert!(cursor.eof());
        assert!(cursor.fetch().unwrap().is_none());
    }

    #[test]
    fn test_snapshot_is_stable() {
        let store = store_with(2);
        let cursor = open_cursor(&store);
        store
            .borrow_mut()
            .delete_all(&[vec![Value::Int64(1)]])
            .unwrap();
        assert_eq!(store.borrow().len(), 1);
        assert_eq!(cursor.fetch().unwrap().unwrap().get(0), Some(&Value::Int64(1)));
    }

    #[test]
    fn test_stage_and_sync() {
        let store = store_with(2);
        let mut cursor = open_cursor(&store);
        let row = cursor.fetch().unwrap().unwrap();

        let mut first = (*row).clone();
        first.set(1, Value::String("draft".into()));
        cursor.stage(first).unwrap();

        let mut second = (*row).clone();
        second.set(1, Value::String("final".into()));
        cursor.stage(second).unwrap();

        let keys = cursor.sync().unwrap();
        assert_eq!(keys, vec![vec![Value::Int64(1)]]);
        assert!(cursor.sync().unwrap().is_empty());

        let rows = store.borrow().scan();
        assert_eq!(rows[0].get(1), Some(&Value::String("final".into())));
    }
}
