//! The SELECT pipeline.
//!
//! Rows come from the join engine and pass through, in order: direct field
//! evaluation, grouping, aggregate fields, HAVING, window fields, ORDER BY,
//! DISTINCT and OFFSET/LIMIT. Field values live in the `$` projection slot of
//! each row's composition, so later stages can refer to field aliases.

mod limit;
mod order;
mod window;

pub use limit::Pagination;
pub use order::compare_keys;

use crate::ast::{Expr, Field, Join, Over, SelectStatement};
use crate::compose::{RowComposition, Slot};
use crate::context::ExecutionContext;
use crate::engine::JoinCursorEngine;
use crate::eval::{evaluate, evaluate_predicate, Scope};
use crate::path::rewrite_select;
use crate::statement::ResultSet;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;
use skein_core::{Error, Result, SchemaError, Value};
use tracing::trace;
use window::WindowEvaluator;

/// An output row: the representative composition and, once grouped, every
/// member of its group.
pub(crate) struct Output {
    row: RowComposition,
    members: Option<Vec<RowComposition>>,
}

impl Output {
    pub(crate) fn row(row: RowComposition) -> Self {
        Self { row, members: None }
    }

    pub(crate) fn scope<'a>(&'a self, params: &'a [Value]) -> Scope<'a> {
        let scope = Scope::new(&self.row, params);
        match &self.members {
            Some(members) => scope.with_group(members),
            None => scope,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldKind {
    Direct,
    Aggregate,
    Window,
}

impl FieldKind {
    fn of(expr: &Expr) -> Self {
        if expr.has_window() {
            FieldKind::Window
        } else if expr.has_plain_aggregate() {
            FieldKind::Aggregate
        } else {
            FieldKind::Direct
        }
    }
}

/// Executes a SELECT statement.
pub fn execute(
    stmt: &SelectStatement,
    ctx: &ExecutionContext<'_>,
    params: &[Value],
) -> Result<ResultSet> {
    let mut stmt = stmt.clone();
    rewrite_select(&mut stmt, ctx)?;

    let (main, rest) = stmt
        .from
        .split_first()
        .ok_or_else(|| Error::validation("SELECT requires a source"))?;
    let mut joins: Vec<Join> = rest.iter().cloned().map(Join::inner).collect();
    joins.extend(stmt.joins.iter().cloned());

    let mut engine = JoinCursorEngine::new(main, &joins, stmt.where_clause.as_ref(), params);
    engine.init(ctx)?;
    let rows = engine.collect()?;
    let empty = engine.empty_composition();

    let fields = expand_fields(&stmt.fields, &empty)?;
    let kinds: Vec<FieldKind> = fields.iter().map(|(_, e)| FieldKind::of(e)).collect();
    let columns: Vec<String> = fields.iter().map(|(name, _)| name.clone()).collect();

    // Pass 1: direct fields.
    let direct = |mut comp: RowComposition| -> Result<RowComposition> {
        for ((name, expr), kind) in fields.iter().zip(&kinds) {
            let slot = match kind {
                FieldKind::Direct => Slot::Value(evaluate(expr, &Scope::new(&comp, params))?),
                _ => Slot::Unset,
            };
            comp.push_slot(name, slot);
        }
        Ok(comp)
    };
    let rows = rows.into_iter().map(&direct).collect::<Result<Vec<_>>>()?;

    let grouped = !stmt.group_by.is_empty()
        || stmt.having.is_some()
        || fields.iter().any(|(_, e)| e.has_plain_aggregate())
        || stmt.order_by.iter().any(|o| o.expr.has_plain_aggregate());
    let mut outputs = if grouped {
        group_rows(rows, &stmt.group_by, params, || direct(empty.clone()))?
    } else {
        rows.into_iter().map(Output::row).collect()
    };
    trace!(rows = outputs.len(), grouped, "select rows collected");

    // Pass 2: aggregate fields, once per group.
    if kinds.contains(&FieldKind::Aggregate) {
        for output in &mut outputs {
            let mut values = Vec::new();
            for (i, ((_, expr), kind)) in fields.iter().zip(&kinds).enumerate() {
                if *kind == FieldKind::Aggregate {
                    values.push((i, evaluate(expr, &output.scope(params))?));
                }
            }
            for (i, value) in values {
                output.row.set_slot_at(i, value);
            }
        }
    }

    if let Some(having) = &stmt.having {
        let mut kept = Vec::with_capacity(outputs.len());
        for output in outputs {
            let scope = output.scope(params).projection_first();
            if evaluate_predicate(having, &scope)
                .map_err(|e| Error::condition(having.to_string(), e))?
            {
                kept.push(output);
            }
        }
        outputs = kept;
    }

    // Pass 3: window fields.
    let mut windows = WindowEvaluator::new(&stmt.windows, params);
    for (name, _) in &stmt.windows {
        windows.resolve(&Over::Named(name.clone()))?;
    }
    for (i, ((_, expr), kind)) in fields.iter().zip(&kinds).enumerate() {
        if *kind != FieldKind::Window {
            continue;
        }
        let values = windows.evaluate_field(expr, &outputs)?;
        for (output, value) in outputs.iter_mut().zip(values) {
            output.row.set_slot_at(i, value);
        }
    }

    let outputs = order::sort_outputs(outputs, &stmt.order_by, params)?;
    let mut rows: Vec<Vec<Value>> = outputs.iter().map(|o| o.row.project()).collect();

    if stmt.distinct {
        let mut unique: Vec<Vec<Value>> = Vec::with_capacity(rows.len());
        for row in rows {
            if !unique.contains(&row) {
                unique.push(row);
            }
        }
        rows = unique;
    }

    Pagination::new(stmt.limit, stmt.offset).apply(&mut rows);
    Ok(ResultSet { columns, rows })
}

/// Expands `*` and `alias.*` into one column field per visible column.
/// An empty field list selects every visible column.
fn expand_fields(fields: &[Field], sources: &RowComposition) -> Result<Vec<(String, Expr)>> {
    let all = [Field::Wildcard(None)];
    let fields = if fields.is_empty() { &all[..] } else { fields };

    let mut out = Vec::new();
    for field in fields {
        match field {
            Field::Expr { expr, .. } => out.push((field.output_name(), expr.clone())),
            Field::Wildcard(None) => {
                for (alias, sub) in sources.sources().filter(|(_, s)| !s.is_hidden()) {
                    for column in sub.columns() {
                        out.push((column.clone(), Expr::column(alias, column.clone())));
                    }
                }
            }
            Field::Wildcard(Some(alias)) => {
                let sub = sources
                    .sub_row(alias)
                    .ok_or_else(|| SchemaError::UnknownAlias {
                        alias: alias.clone(),
                    })?;
                for column in sub.columns() {
                    out.push((column.clone(), Expr::column(alias.as_str(), column.clone())));
                }
            }
        }
    }
    Ok(out)
}

/// Partitions rows by their GROUP BY key in first-seen order. Without GROUP
/// BY every row falls into one group, which exists even for empty input.
fn group_rows(
    rows: Vec<RowComposition>,
    group_by: &[Expr],
    params: &[Value],
    empty_head: impl FnOnce() -> Result<RowComposition>,
) -> Result<Vec<Output>> {
    if group_by.is_empty() {
        let row = match rows.first() {
            Some(first) => first.clone(),
            None => empty_head()?,
        };
        return Ok(vec![Output {
            row,
            members: Some(rows),
        }]);
    }

    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Vec<RowComposition>> = Vec::new();
    for comp in rows {
        let scope = Scope::new(&comp, params).projection_first();
        let key = group_by
            .iter()
            .map(|e| evaluate(e, &scope))
            .collect::<Result<Vec<_>>>()?;
        match index.get(&key) {
            Some(&g) => groups[g].push(comp),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![comp]);
            }
        }
    }

    Ok(groups
        .into_iter()
        .filter_map(|members| {
            let row = members.first()?.clone();
            Some(Output {
                row,
                members: Some(members),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{SortOrder, TableSource, WindowSpec};
    use skein_core::schema::{SchemaCatalog, TableBuilder};
    use skein_core::DataType;
    use skein_storage::{MemoryStorage, Storage, Store};

    /// emp(id, dept, pay).
    fn setup(rows: &[(i64, &str, i64)]) -> (SchemaCatalog, MemoryStorage) {
        let schema = TableBuilder::new("emp")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("dept", DataType::String)
            .unwrap()
            .add_column("pay", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], false)
            .unwrap()
            .build()
            .unwrap();
        let mut catalog = SchemaCatalog::new("main");
        catalog.register("main", schema).unwrap();
        let storage = MemoryStorage::from_catalog(&catalog);
        let values = rows
            .iter()
            .map(|(id, dept, pay)| vec![Value::Int64(*id), Value::from(*dept), Value::Int64(*pay)])
            .collect();
        storage
            .store("main", "emp")
            .unwrap()
            .borrow_mut()
            .add_all(
                values,
                &[String::from("id"), String::from("dept"), String::from("pay")],
                None,
            )
            .unwrap();
        (catalog, storage)
    }

    fn run(stmt: &SelectStatement, rows: &[(i64, &str, i64)]) -> Result<ResultSet> {
        let (catalog, storage) = setup(rows);
        let ctx = ExecutionContext::new(&catalog, &storage);
        execute(stmt, &ctx, &[])
    }

    const STAFF: &[(i64, &str, i64)] = &[(1, "eng", 10), (2, "ops", 5), (3, "eng", 30), (4, "ops", 7)];

    #[test]
    fn test_wildcard() {
        let result = run(&SelectStatement::new(TableSource::table("emp")).wildcard(), STAFF).unwrap();
        assert_eq!(result.columns, vec!["id", "dept", "pay"]);
        assert_eq!(result.rows.len(), 4);

        let err = run(
            &SelectStatement::new(TableSource::table("emp")).wildcard_of("x"),
            STAFF,
        )
        .unwrap_err();
        assert!(matches!(
            err.as_schema_error(),
            Some(SchemaError::UnknownAlias { .. })
        ));
    }

    #[test]
    fn test_group_by_with_alias_order() {
        let stmt = SelectStatement::new(TableSource::table("emp"))
            .field(Expr::col("dept"))
            .field_as(Expr::sum(Expr::col("pay")), "total")
            .group_by(Expr::col("dept"))
            .order_by(Expr::col("total"), SortOrder::Asc);
        let result = run(&stmt, STAFF).unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::from("ops"), Value::Int64(12)],
                vec![Value::from("eng"), Value::Int64(40)],
            ]
        );
    }

    #[test]
    fn test_implicit_group_on_empty_input() {
        let stmt = SelectStatement::new(TableSource::table("emp"))
            .field_as(Expr::count_star(), "n")
            .field_as(Expr::sum(Expr::col("pay")), "total");
        let result = run(&stmt, &[]).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int64(0), Value::Null]]);
    }

    #[test]
    fn test_having() {
        let stmt = SelectStatement::new(TableSource::table("emp"))
            .field(Expr::col("dept"))
            .group_by(Expr::col("dept"))
            .having(Expr::gt(Expr::max(Expr::col("pay")), Expr::literal(20i64)));
        let result = run(&stmt, STAFF).unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("eng")]]);
    }

    #[test]
    fn test_having_error_names_clause() {
        let stmt = SelectStatement::new(TableSource::table("emp"))
            .field(Expr::col("dept"))
            .group_by(Expr::col("dept"))
            .having(Expr::gt(Expr::col("missing"), Expr::literal(1i64)));
        let err = run(&stmt, STAFF).unwrap_err();
        assert!(matches!(err, Error::ConditionEvaluation { .. }));
    }

    #[test]
    fn test_window_over_groups() {
        let stmt = SelectStatement::new(TableSource::table("emp"))
            .field(Expr::col("dept"))
            .field_as(
                Expr::rank(Over::Spec(
                    WindowSpec::new().order_by(Expr::sum(Expr::col("pay")), SortOrder::Desc),
                )),
                "place",
            )
            .group_by(Expr::col("dept"));
        let result = run(&stmt, STAFF).unwrap();
        assert_eq!(
            result.rows,
            vec![
                vec![Value::from("eng"), Value::Int64(1)],
                vec![Value::from("ops"), Value::Int64(2)],
            ]
        );
    }

    #[test]
    fn test_named_window_must_exist() {
        let stmt = SelectStatement::new(TableSource::table("emp"))
            .field(Expr::row_number(Over::Named(String::from("w"))));
        assert!(matches!(run(&stmt, STAFF), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_distinct_then_limit() {
        let stmt = SelectStatement::new(TableSource::table("emp"))
            .field(Expr::col("dept"))
            .distinct()
            .limit(1);
        let result = run(&stmt, STAFF).unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("eng")]]);
    }

    #[test]
    fn test_group_keys_compare_numbers_by_value() {
        let columns: alloc::rc::Rc<[String]> = vec![String::from("v")].into();
        let rows = [Value::Int64(1), Value::Float64(1.0), Value::Float64(1.5)]
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let mut comp = RowComposition::new();
                let row = skein_core::Row::new(i as u64, vec![v]);
                comp.push("t", alloc::rc::Rc::clone(&columns), Some(alloc::rc::Rc::new(row)));
                comp
            })
            .collect();
        let groups = group_rows(rows, &[Expr::col("v")], &[], || unreachable!()).unwrap();
        let sizes: Vec<usize> = groups
            .iter()
            .map(|g| g.members.as_ref().map_or(0, Vec::len))
            .collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_missing_source() {
        let mut stmt = SelectStatement::new(TableSource::table("emp"));
        stmt.from.clear();
        assert!(run(&stmt, STAFF).is_err());
    }
}
