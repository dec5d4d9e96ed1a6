//! In-memory row storage.
//!
//! `MemoryStore` keeps the rows of one table in row-id order and maintains a
//! primary key index plus one index per unique key.

use crate::store::{DuplicateAction, DuplicateHandler, Store};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use skein_core::schema::TableSchema;
use skein_core::{Error, KeyTuple, Result, Row, RowId, Value};
use tracing::debug;

const PRIMARY_KEY_INDEX: &str = "primary_key";

/// A unique index: key columns plus key → row id.
struct UniqueIndex {
    name: String,
    columns: Vec<usize>,
    entries: BTreeMap<KeyTuple, RowId>,
}

impl UniqueIndex {
    fn new(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            columns,
            entries: BTreeMap::new(),
        }
    }

    fn key(&self, values: &[Value]) -> KeyTuple {
        self.columns
            .iter()
            .map(|&i| values.get(i).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Returns the row holding `values`' key, other than `except`.
    /// Keys containing NULL never collide.
    fn conflict(&self, values: &[Value], except: Option<RowId>) -> Option<RowId> {
        let key = self.key(values);
        if key.iter().any(Value::is_null) {
            return None;
        }
        self.entries
            .get(&key)
            .copied()
            .filter(|&id| Some(id) != except)
    }

    fn insert(&mut self, values: &[Value], row_id: RowId) {
        let key = self.key(values);
        if !key.iter().any(Value::is_null) {
            self.entries.insert(key, row_id);
        }
    }

    fn remove(&mut self, values: &[Value], row_id: RowId) {
        let key = self.key(values);
        if self.entries.get(&key) == Some(&row_id) {
            self.entries.remove(&key);
        }
    }
}

/// A write made by the batch in progress, kept so a failed batch can be
/// rolled back.
enum Undo {
    Inserted(RowId),
    Replaced(RowId, Rc<Row>),
}

/// Row storage for a single table.
pub struct MemoryStore {
    schema: Arc<TableSchema>,
    columns: Vec<String>,
    rows: BTreeMap<RowId, Rc<Row>>,
    /// Primary key first (when the table has one), then unique keys.
    indices: Vec<UniqueIndex>,
    has_primary_key: bool,
    auto_increment_column: Option<usize>,
    next_row_id: RowId,
    next_auto_value: i64,
}

impl MemoryStore {
    /// Creates an empty store for `schema`.
    pub fn new(schema: Arc<TableSchema>) -> Self {
        let mut indices = Vec::new();
        let pk_columns = schema.primary_key_indices();
        let has_primary_key = !pk_columns.is_empty();
        if has_primary_key {
            indices.push(UniqueIndex::new(PRIMARY_KEY_INDEX, pk_columns.clone()));
        }
        for (name, columns) in schema.unique_keys() {
            let columns = columns
                .iter()
                .filter_map(|c| schema.field_index(c))
                .collect();
            indices.push(UniqueIndex::new(name.clone(), columns));
        }
        let auto_increment_column = if schema.auto_increment() {
            pk_columns.first().copied()
        } else {
            None
        };

        Self {
            columns: schema.field_names(),
            schema,
            rows: BTreeMap::new(),
            indices,
            has_primary_key,
            auto_increment_column,
            next_row_id: 0,
            next_auto_value: 1,
        }
    }

    /// Returns the table descriptor.
    pub fn table(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Gets a row by ID.
    pub fn get(&self, row_id: RowId) -> Option<Rc<Row>> {
        self.rows.get(&row_id).cloned()
    }

    /// Gets a row by key.
    pub fn get_by_key(&self, key: &KeyTuple) -> Option<Rc<Row>> {
        self.find_by_key(key).and_then(|id| self.get(id))
    }

    /// Removes every row. Auto-increment counters are kept.
    pub fn clear(&mut self) {
        self.rows.clear();
        for index in &mut self.indices {
            index.entries.clear();
        }
    }

    fn find_by_key(&self, key: &KeyTuple) -> Option<RowId> {
        if self.has_primary_key {
            self.indices[0].entries.get(key).copied()
        } else {
            // Keyless tables are addressed by row id.
            match key.as_slice() {
                [Value::Int64(id)] if *id >= 0 => {
                    let id = *id as RowId;
                    self.rows.contains_key(&id).then_some(id)
                }
                _ => None,
            }
        }
    }

    /// Lays `values` out in schema field order and applies defaults.
    fn layout(&self, values: Vec<Value>, columns: &[usize]) -> Vec<Value> {
        let mut full: Vec<Option<Value>> = vec![None; self.columns.len()];
        for (value, &column) in values.into_iter().zip(columns) {
            full[column] = Some(value);
        }
        full.into_iter()
            .zip(self.schema.fields())
            .map(|(value, field)| {
                value
                    .or_else(|| field.get_default().cloned())
                    .unwrap_or(Value::Null)
            })
            .collect()
    }

    fn assign_auto_value(&mut self, values: &mut [Value]) -> Result<()> {
        let Some(column) = self.auto_increment_column else {
            return Ok(());
        };
        if values[column].is_null() {
            values[column] = Value::Int64(self.next_auto_value);
            self.next_auto_value += 1;
            return Ok(());
        }
        match &values[column] {
            Value::Int64(v) | Value::DateTime(v) => {
                self.next_auto_value = self.next_auto_value.max(v.saturating_add(1));
            }
            other => return Err(Error::type_mismatch("Int64", other.clone())),
        }
        Ok(())
    }

    fn check_not_null(&self, values: &[Value]) -> Result<()> {
        for (value, field) in values.iter().zip(self.schema.fields()) {
            if value.is_null() && !field.is_nullable() {
                return Err(Error::validation(format!(
                    "{}.{} cannot be NULL",
                    self.schema.name(),
                    field.name()
                )));
            }
        }
        Ok(())
    }

    /// Returns the first index `values` collides on, with the colliding row.
    fn find_conflict(&self, values: &[Value], except: Option<RowId>) -> Option<(usize, RowId)> {
        self.indices
            .iter()
            .enumerate()
            .find_map(|(i, index)| index.conflict(values, except).map(|id| (i, id)))
    }

    fn conflict_error(&self, index: usize, values: &[Value]) -> Error {
        let index = &self.indices[index];
        Error::unique_constraint(index.name.clone(), index.key(values))
    }

    fn insert_row(&mut self, values: Vec<Value>) -> KeyTuple {
        let row_id = self.next_row_id;
        self.next_row_id += 1;
        for index in &mut self.indices {
            index.insert(&values, row_id);
        }
        let row = Row::new(row_id, values);
        let key = self.key_of(&row);
        self.rows.insert(row_id, Rc::new(row));
        key
    }

    fn replace_row(&mut self, row_id: RowId, row: Row) -> Result<KeyTuple> {
        self.replace_row_logged(row_id, row).map(|(key, _)| key)
    }

    /// Replaces a row and returns its new key together with the old row.
    fn replace_row_logged(&mut self, row_id: RowId, mut row: Row) -> Result<(KeyTuple, Rc<Row>)> {
        let old = self
            .rows
            .get(&row_id)
            .cloned()
            .ok_or_else(|| Error::invalid_operation(format!("row {} does not exist", row_id)))?;
        self.check_not_null(row.values())?;
        if let Some((index, _)) = self.find_conflict(row.values(), Some(row_id)) {
            return Err(self.conflict_error(index, row.values()));
        }
        for index in &mut self.indices {
            index.remove(old.values(), row_id);
            index.insert(row.values(), row_id);
        }
        if let Some(column) = self.auto_increment_column {
            if let Some(v) = row.get(column).and_then(Value::as_i64) {
                self.next_auto_value = self.next_auto_value.max(v.saturating_add(1));
            }
        }
        while row.version() <= old.version() {
            row.increment_version();
        }
        let key = self.key_of(&row);
        self.rows.insert(row_id, Rc::new(row));
        Ok((key, old))
    }

    /// Reverts the writes of a failed batch, newest first.
    fn roll_back(&mut self, undo: Vec<Undo>, next_row_id: RowId, next_auto_value: i64) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Inserted(row_id) => {
                    if let Some(row) = self.rows.remove(&row_id) {
                        for index in &mut self.indices {
                            index.remove(row.values(), row_id);
                        }
                    }
                }
                Undo::Replaced(row_id, old) => {
                    if let Some(current) = self.rows.insert(row_id, Rc::clone(&old)) {
                        for index in &mut self.indices {
                            index.remove(current.values(), row_id);
                            index.insert(old.values(), row_id);
                        }
                    }
                }
            }
        }
        self.next_row_id = next_row_id;
        self.next_auto_value = next_auto_value;
    }

    fn add_batch(
        &mut self,
        rows: Vec<Vec<Value>>,
        positions: &[usize],
        mut on_duplicate: Option<&mut dyn DuplicateHandler>,
        undo: &mut Vec<Undo>,
    ) -> Result<(Vec<KeyTuple>, usize)> {
        let mut keys = Vec::with_capacity(rows.len());
        let mut ignored = 0usize;
        for values in rows {
            if values.len() != positions.len() {
                return Err(Error::validation(format!(
                    "expected {} values for {}, got {}",
                    positions.len(),
                    self.schema.name(),
                    values.len()
                )));
            }
            let mut values = self.layout(values, positions);
            self.assign_auto_value(&mut values)?;
            self.check_not_null(&values)?;

            let Some((index, existing_id)) = self.find_conflict(&values, None) else {
                undo.push(Undo::Inserted(self.next_row_id));
                keys.push(self.insert_row(values));
                continue;
            };
            let Some(handler) = on_duplicate.as_deref_mut() else {
                return Err(self.conflict_error(index, &values));
            };
            let existing = self
                .rows
                .get(&existing_id)
                .cloned()
                .ok_or_else(|| Error::invalid_operation("unique index points at a missing row"))?;
            let incoming = Row::dummy(values);
            match handler.resolve(&existing, &incoming)? {
                DuplicateAction::Ignore => ignored += 1,
                DuplicateAction::Update(updated) => {
                    let replacement = Row::new(existing_id, updated);
                    let (key, old) = self.replace_row_logged(existing_id, replacement)?;
                    undo.push(Undo::Replaced(existing_id, old));
                    keys.push(key);
                }
            }
        }
        Ok((keys, ignored))
    }
}

impl Store for MemoryStore {
    fn schema(&self) -> Option<&TableSchema> {
        Some(&self.schema)
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn scan(&self) -> Vec<Rc<Row>> {
        self.rows.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn key_of(&self, row: &Row) -> KeyTuple {
        if self.has_primary_key {
            self.indices[0].key(row.values())
        } else {
            vec![Value::Int64(row.id() as i64)]
        }
    }

    fn add_all(
        &mut self,
        rows: Vec<Vec<Value>>,
        columns: &[String],
        on_duplicate: Option<&mut dyn DuplicateHandler>,
    ) -> Result<Vec<KeyTuple>> {
        let positions = columns
            .iter()
            .map(|c| {
                self.schema
                    .field_index(c)
                    .ok_or_else(|| Error::column_not_found(self.schema.name(), c.as_str()))
            })
            .collect::<Result<Vec<_>>>()?;

        let (next_row_id, next_auto_value) = (self.next_row_id, self.next_auto_value);
        let mut undo = Vec::new();
        let (keys, ignored) = match self.add_batch(rows, &positions, on_duplicate, &mut undo) {
            Ok(written) => written,
            Err(e) => {
                debug!(table = self.schema.name(), undone = undo.len(), "add_all rolled back");
                self.roll_back(undo, next_row_id, next_auto_value);
                return Err(e);
            }
        };

        debug!(
            table = self.schema.name(),
            written = keys.len(),
            ignored,
            "add_all"
        );
        Ok(keys)
    }

    fn delete_all(&mut self, keys: &[KeyTuple]) -> Result<usize> {
        let mut deleted = 0;
        for key in keys {
            let Some(row_id) = self.find_by_key(key) else {
                continue;
            };
            if let Some(row) = self.rows.remove(&row_id) {
                for index in &mut self.indices {
                    index.remove(row.values(), row_id);
                }
                deleted += 1;
            }
        }
        debug!(table = self.schema.name(), deleted, "delete_all");
        Ok(deleted)
    }

    fn update_all(&mut self, rows: Vec<Row>) -> Result<Vec<KeyTuple>> {
        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != self.columns.len() {
                return Err(Error::validation(format!(
                    "row width {} does not match {} columns of {}",
                    row.len(),
                    self.columns.len(),
                    self.schema.name()
                )));
            }
            keys.push(self.replace_row(row.id(), row)?);
        }
        debug!(table = self.schema.name(), updated = keys.len(), "update_all");
        Ok(keys)
    }
}

impl core::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("table", &self.schema.name().to_string())
            .field("rows", &self.rows.len())
            .finish()
    }
}
