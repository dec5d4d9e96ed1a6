//! INSERT.

use super::AffectedMap;
use crate::ast::{Assignment, InsertStatement, InsertValues, OnDuplicate, TableSource};
use crate::compose::RowComposition;
use crate::context::ExecutionContext;
use crate::eval::{evaluate, Scope};
use crate::select;
use crate::statement::AffectedRows;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use skein_core::{Error, Result, Row, Value};
use skein_storage::{DuplicateAction, DuplicateHandler};
use tracing::debug;

/// Alias of the incoming row inside ON DUPLICATE assignments.
pub const EXCLUDED: &str = "excluded";

/// Resolves key collisions with an ON DUPLICATE assignment list.
///
/// Assignments see the stored row under the table alias and the incoming
/// row under [`EXCLUDED`]. Unqualified names resolve against the stored row.
pub struct OnDuplicateHandler<'s> {
    alias: String,
    columns: Rc<[String]>,
    /// Column index and expression of each assignment.
    plan: Vec<(usize, &'s Assignment)>,
    params: &'s [Value],
}

impl<'s> OnDuplicateHandler<'s> {
    /// Binds `assignments` to the columns of the target table.
    pub fn new(
        alias: impl Into<String>,
        columns: &[String],
        assignments: &'s [Assignment],
        params: &'s [Value],
    ) -> Result<Self> {
        let alias = alias.into();
        let mut plan = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if let Some(table) = &assignment.column.table {
                if *table != alias {
                    return Err(Error::validation(format!(
                        "ON DUPLICATE can only assign columns of {}, not {}",
                        alias, assignment.column
                    )));
                }
            }
            let index = columns
                .iter()
                .position(|c| *c == assignment.column.column)
                .ok_or_else(|| {
                    Error::column_not_found(alias.as_str(), assignment.column.column.as_str())
                })?;
            plan.push((index, assignment));
        }
        Ok(Self {
            alias,
            columns: columns.to_vec().into(),
            plan,
            params,
        })
    }
}

impl DuplicateHandler for OnDuplicateHandler<'_> {
    fn resolve(&mut self, existing: &Row, incoming: &Row) -> Result<DuplicateAction> {
        let mut comp = RowComposition::new();
        comp.push(
            self.alias.as_str(),
            Rc::clone(&self.columns),
            Some(Rc::new(existing.clone())),
        );
        comp.push_hidden(EXCLUDED, Rc::clone(&self.columns), Some(Rc::new(incoming.clone())));

        let scope = Scope::new(&comp, self.params);
        let values = self
            .plan
            .iter()
            .map(|(_, a)| evaluate(&a.value, &scope))
            .collect::<Result<Vec<_>>>()?;

        let mut row = existing.values().to_vec();
        for ((index, _), value) in self.plan.iter().zip(values) {
            row[*index] = value;
        }
        Ok(DuplicateAction::Update(row))
    }
}

/// Inserts the rows of `stmt` and returns their keys in input order.
pub fn insert(
    stmt: &InsertStatement,
    ctx: &ExecutionContext<'_>,
    params: &[Value],
) -> Result<AffectedMap> {
    let TableSource::Table { database, name, .. } = &stmt.target else {
        return Err(Error::validation(format!(
            "INSERT target must be a base table, got {}",
            stmt.target
        )));
    };
    let schema = ctx.lookup(database.as_deref(), name)?;
    let store = ctx.store(database.as_deref(), name)?;
    let alias = stmt.target.alias().to_string();

    let columns: Vec<String> = match &stmt.values {
        InsertValues::Set(assignments) => assignments
            .iter()
            .map(|a| a.column.column.clone())
            .collect(),
        _ if !stmt.columns.is_empty() => stmt.columns.clone(),
        _ => schema.field_names(),
    };

    let empty = RowComposition::new();
    let scope = Scope::new(&empty, params);
    let rows: Vec<Vec<Value>> = match &stmt.values {
        InsertValues::Values(rows) => rows
            .iter()
            .map(|row| row.iter().map(|e| evaluate(e, &scope)).collect::<Result<Vec<_>>>())
            .collect::<Result<_>>()?,
        InsertValues::Select(query) => select::execute(query, ctx, params)?.rows,
        InsertValues::Set(assignments) => vec![assignments
            .iter()
            .map(|a| evaluate(&a.value, &scope))
            .collect::<Result<Vec<_>>>()?],
    };
    if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
        return Err(Error::validation(format!(
            "INSERT INTO {} expects {} values per row, got {}",
            name,
            columns.len(),
            row.len()
        )));
    }
    let count = rows.len();

    let keys = match &stmt.on_duplicate {
        None => store.borrow_mut().add_all(rows, &columns, None)?,
        Some(OnDuplicate::Ignore) => {
            let mut ignore = |_: &Row, _: &Row| -> Result<DuplicateAction> {
                Ok(DuplicateAction::Ignore)
            };
            store.borrow_mut().add_all(rows, &columns, Some(&mut ignore))?
        }
        Some(OnDuplicate::Update(assignments)) => {
            let table_columns = store.borrow().columns().to_vec();
            let mut handler = OnDuplicateHandler::new(&alias, &table_columns, assignments, params)?;
            store.borrow_mut().add_all(rows, &columns, Some(&mut handler))?
        }
    };
    debug!(table = name.as_str(), rows = count, written = keys.len(), "rows inserted");

    let mut affected = AffectedMap::new();
    affected.insert(alias, AffectedRows::from_keys(keys));
    Ok(affected)
}
