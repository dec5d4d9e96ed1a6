//! The store contract.
//!
//! A `Store` owns the rows of one table (or of one derived query result) and
//! exposes batch write operations. Statement evaluation reads stores through
//! cursors opened with [`open_cursor`].

use crate::cursor::{Cursor, MemoryCursor};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use skein_core::schema::TableSchema;
use skein_core::{KeyTuple, Result, Row, Value};

/// Shared handle to a store. Evaluation is single-threaded, so handles are
/// reference counted and borrow-checked at runtime.
pub type StoreRef = Rc<RefCell<dyn Store>>;

/// Outcome of a key collision during `add_all`.
#[derive(Clone, Debug, PartialEq)]
pub enum DuplicateAction {
    /// Keep the existing row and drop the incoming one.
    Ignore,
    /// Replace the existing row's values (full row, schema field order).
    Update(Vec<Value>),
}

/// Caller-supplied resolution for primary/unique key collisions.
pub trait DuplicateHandler {
    /// Decides what to do when `incoming` collides with `existing`.
    fn resolve(&mut self, existing: &Row, incoming: &Row) -> Result<DuplicateAction>;
}

impl<F> DuplicateHandler for F
where
    F: FnMut(&Row, &Row) -> Result<DuplicateAction>,
{
    fn resolve(&mut self, existing: &Row, incoming: &Row) -> Result<DuplicateAction> {
        self(existing, incoming)
    }
}

/// Tabular storage behind a table source.
pub trait Store {
    /// Returns the table descriptor, or `None` for derived results.
    fn schema(&self) -> Option<&TableSchema>;

    /// Returns the column names rows are laid out in.
    fn columns(&self) -> &[String];

    /// Returns a snapshot of the rows in scan order.
    fn scan(&self) -> Vec<Rc<Row>>;

    /// Returns the number of rows.
    fn len(&self) -> usize;

    /// Returns true if the store holds no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the key identifying `row` for `delete_all`.
    fn key_of(&self, row: &Row) -> KeyTuple;

    /// Inserts rows whose values are laid out by `columns`. Omitted columns
    /// take their default (or NULL). Returns the key of every row written, in
    /// input order; rows dropped by [`DuplicateAction::Ignore`] yield no key.
    fn add_all(
        &mut self,
        rows: Vec<Vec<Value>>,
        columns: &[String],
        on_duplicate: Option<&mut dyn DuplicateHandler>,
    ) -> Result<Vec<KeyTuple>>;

    /// Deletes the rows with the given keys and returns how many existed.
    fn delete_all(&mut self, keys: &[KeyTuple]) -> Result<usize>;

    /// Replaces rows by row id and returns their (possibly new) keys.
    fn update_all(&mut self, rows: Vec<Row>) -> Result<Vec<KeyTuple>>;
}

/// Opens a cursor over a snapshot of `store`.
pub fn open_cursor(store: &StoreRef) -> Box<dyn Cursor> {
    let rows = store.borrow().scan();
    Box::new(MemoryCursor::new(Rc::clone(store), rows))
}
