//! Table source evaluation.

use crate::ast::TableSource;
use crate::context::ExecutionContext;
use crate::select;
use alloc::rc::Rc;
use alloc::sync::Arc;
use core::cell::RefCell;
use skein_core::schema::TableSchema;
use skein_core::{Result, Value};
use skein_storage::{ResultStore, StoreRef};

impl TableSource {
    /// Returns the table descriptor of a base table source; derived sources
    /// have none.
    pub fn schema(&self, ctx: &ExecutionContext<'_>) -> Result<Option<Arc<TableSchema>>> {
        match self {
            TableSource::Table { database, name, .. } => {
                ctx.lookup(database.as_deref(), name).map(Some)
            }
            TableSource::Derived { .. } => Ok(None),
        }
    }

    /// Returns the store behind this source. Derived queries are evaluated
    /// eagerly into a read-only result store.
    pub fn eval(&self, ctx: &ExecutionContext<'_>, params: &[Value]) -> Result<StoreRef> {
        match self {
            TableSource::Table { database, name, .. } => ctx.store(database.as_deref(), name),
            TableSource::Derived { query, .. } => {
                let result = select::execute(query, ctx, params)?;
                let store: StoreRef = Rc::new(RefCell::new(ResultStore::new(
                    result.columns,
                    result.rows,
                )));
                Ok(store)
            }
        }
    }
}
