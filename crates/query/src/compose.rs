//! Row composition: the per-fetch container mapping table aliases to raw
//! sub-rows, plus the `$` projection slot computed fields are written into.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use skein_core::{Error, Result, Row, SchemaError, Value};

/// Reserved alias addressing the projection slot.
pub const PROJECTION_ALIAS: &str = "$";

/// A projection slot value. `Unset` marks a field whose evaluation is
/// deferred (aggregates and windows) and is distinct from NULL.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Unset,
    Value(Value),
}

/// One source's contribution to a composition.
#[derive(Clone, Debug)]
pub struct SubRow {
    columns: Rc<[String]>,
    row: Option<Rc<Row>>,
    hidden: bool,
}

impl SubRow {
    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the raw row, or `None` for an outer-null sub-row.
    pub fn row(&self) -> Option<&Rc<Row>> {
        self.row.as_ref()
    }

    /// Returns true if this is an outer-null sub-row.
    pub fn is_empty(&self) -> bool {
        self.row.is_none()
    }

    /// Returns true if unqualified references skip this source.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn value(&self, column: usize) -> Value {
        self.row
            .as_ref()
            .and_then(|row| row.get(column))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Ordered `alias → sub-row` mapping plus the `$` projection slot.
#[derive(Clone, Debug, Default)]
pub struct RowComposition {
    sources: Vec<(String, SubRow)>,
    projection: Vec<(String, Slot)>,
}

impl RowComposition {
    /// Creates an empty composition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sub-row under `alias`.
    pub fn push(&mut self, alias: impl Into<String>, columns: Rc<[String]>, row: Option<Rc<Row>>) {
        self.sources.push((
            alias.into(),
            SubRow {
                columns,
                row,
                hidden: false,
            },
        ));
    }

    /// Appends a sub-row that only qualified references can reach.
    pub fn push_hidden(
        &mut self,
        alias: impl Into<String>,
        columns: Rc<[String]>,
        row: Option<Rc<Row>>,
    ) {
        self.sources.push((
            alias.into(),
            SubRow {
                columns,
                row,
                hidden: true,
            },
        ));
    }

    /// Returns the number of sub-rows.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if there are no sub-rows.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Returns true if any sub-row holds a row.
    pub fn has_rows(&self) -> bool {
        self.sources.iter().any(|(_, s)| !s.is_empty())
    }

    /// Returns the sub-row for `alias`.
    pub fn sub_row(&self, alias: &str) -> Option<&SubRow> {
        self.sources
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, s)| s)
    }

    /// Returns the raw row for `alias`, if the sub-row is not outer-null.
    pub fn get(&self, alias: &str) -> Option<&Rc<Row>> {
        self.sub_row(alias).and_then(|s| s.row())
    }

    /// Returns the aliases in composition order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|(a, _)| a.as_str())
    }

    /// Iterates `(alias, sub-row)` pairs in composition order.
    pub fn sources(&self) -> impl Iterator<Item = (&str, &SubRow)> {
        self.sources.iter().map(|(a, s)| (a.as_str(), s))
    }

    /// Reads `alias.column`. Outer-null sub-rows read as NULL.
    pub fn column(&self, alias: &str, column: &str) -> Result<Value> {
        let sub = self.sub_row(alias).ok_or_else(|| SchemaError::UnknownAlias {
            alias: alias.to_string(),
        })?;
        let index = sub
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| Error::column_not_found(alias, column))?;
        Ok(sub.value(index))
    }

    /// Reads an unqualified column from the one visible source defining it.
    /// Returns `None` when no visible source has the column.
    pub fn find_unqualified(&self, column: &str) -> Result<Option<Value>> {
        let mut found: Option<Value> = None;
        let mut aliases: Vec<String> = Vec::new();
        for (alias, sub) in self.sources.iter().filter(|(_, s)| !s.hidden) {
            if let Some(index) = sub.columns.iter().position(|c| c == column) {
                aliases.push(alias.clone());
                if found.is_none() {
                    found = Some(sub.value(index));
                }
            }
        }
        if aliases.len() > 1 {
            return Err(SchemaError::AmbiguousColumn {
                column: column.to_string(),
                aliases,
            }
            .into());
        }
        Ok(found)
    }

    /// Appends a slot without checking for an existing one of the same name.
    pub fn push_slot(&mut self, name: &str, slot: Slot) {
        self.projection.push((name.to_string(), slot));
    }

    /// Writes the slot at `index`.
    pub fn set_slot_at(&mut self, index: usize, value: Value) {
        if let Some((_, slot)) = self.projection.get_mut(index) {
            *slot = Slot::Value(value);
        }
    }

    /// Returns the projection slot named `name`.
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.projection
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// Returns the projection slots in field order.
    pub fn projection(&self) -> &[(String, Slot)] {
        &self.projection
    }

    /// Returns the projected values; unset slots read as NULL.
    pub fn project(&self) -> Vec<Value> {
        self.projection
            .iter()
            .map(|(_, slot)| match slot {
                Slot::Value(v) => v.clone(),
                Slot::Unset => Value::Null,
            })
            .collect()
    }
}
