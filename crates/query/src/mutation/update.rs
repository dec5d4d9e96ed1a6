//! UPDATE.

use super::AffectedMap;
use crate::ast::UpdateStatement;
use crate::context::ExecutionContext;
use crate::engine::JoinCursorEngine;
use crate::eval::{evaluate, Scope};
use crate::path::rewrite_update;
use crate::statement::AffectedRows;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use skein_core::{Error, Result, Row, SchemaError, Value};
use tracing::debug;

/// Updates the rows matched by `stmt`.
///
/// Every SET expression is evaluated against the composition before any of
/// them is applied, so assignments never see each other's results. Sources
/// whose sub-row is outer-null are left alone.
pub fn update(
    stmt: &UpdateStatement,
    ctx: &ExecutionContext<'_>,
    params: &[Value],
) -> Result<AffectedMap> {
    let mut stmt = stmt.clone();
    rewrite_update(&mut stmt, ctx)?;
    let target = stmt.target.alias().to_string();

    let mut engine =
        JoinCursorEngine::new(&stmt.target, &stmt.joins, stmt.where_clause.as_ref(), params);
    engine.init(ctx)?;

    // (alias, column index) of every assignment.
    let mut plan: Vec<(String, usize)> = Vec::with_capacity(stmt.set.len());
    for assignment in &stmt.set {
        let alias = assignment.column.table.as_deref().unwrap_or(&target);
        let columns = engine
            .columns(alias)
            .ok_or_else(|| SchemaError::UnknownAlias {
                alias: alias.to_string(),
            })?;
        let index = columns
            .iter()
            .position(|c| *c == assignment.column.column)
            .ok_or_else(|| Error::column_not_found(alias, assignment.column.column.as_str()))?;
        plan.push((alias.to_string(), index));
    }

    while let Some(comp) = engine.fetch()? {
        let scope = Scope::new(&comp, params);
        let values = stmt
            .set
            .iter()
            .map(|a| evaluate(&a.value, &scope))
            .collect::<Result<Vec<_>>>()?;

        let mut updated: Vec<(&str, Row)> = Vec::new();
        for ((alias, index), value) in plan.iter().zip(values) {
            let Some(row) = comp.get(alias) else {
                continue;
            };
            let slot = match updated.iter().position(|(a, _)| *a == alias.as_str()) {
                Some(slot) => slot,
                None => {
                    updated.push((alias.as_str(), Row::clone(row)));
                    updated.len() - 1
                }
            };
            updated[slot].1.set(*index, value);
        }
        for (alias, row) in updated {
            engine.stage_update(alias, row)?;
        }
    }

    let synced = engine.sync_cursors()?;
    let mut affected = AffectedMap::new();
    for (alias, keys) in synced {
        if keys.is_empty() && alias != target {
            continue;
        }
        debug!(alias = alias.as_str(), count = keys.len(), "rows updated");
        affected.insert(alias, AffectedRows::from_keys(keys));
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Assignment, Expr, Join, TableSource};
    use crate::mutation::fixtures::{rows, setup};
    use alloc::vec;

    #[test]
    fn test_update_where() {
        let (catalog, storage) = setup(&[(1, 10), (2, 20)], &[]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let stmt = UpdateStatement::new(
            TableSource::table("a"),
            vec![Assignment::new(
                "x",
                Expr::add(Expr::col("x"), Expr::literal(1i64)),
            )],
        )
        .filter(Expr::eq(Expr::col("id"), Expr::literal(2i64)));
        let affected = update(&stmt, &ctx, &[]).unwrap();
        assert_eq!(affected["a"].keys, vec![vec![Value::Int64(2)]]);
        assert_eq!(
            rows(&storage, "a"),
            vec![
                vec![Value::Int64(1), Value::Int64(10)],
                vec![Value::Int64(2), Value::Int64(21)],
            ]
        );
    }

    #[test]
    fn test_assignments_see_original_values() {
        let (catalog, storage) = setup(&[(1, 10)], &[(5, 1, 3)]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let stmt = UpdateStatement::new(
            TableSource::table("b"),
            vec![
                Assignment::new("y", Expr::column("b", "a_id")),
                Assignment::new("a_id", Expr::column("b", "y")),
            ],
        );
        update(&stmt, &ctx, &[]).unwrap();
        assert_eq!(
            rows(&storage, "b"),
            vec![vec![Value::Int64(5), Value::Int64(3), Value::Int64(1)]]
        );
    }

    #[test]
    fn test_update_joined_source() {
        let (catalog, storage) = setup(&[(1, 10), (2, 20)], &[(7, 1, 0)]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let stmt = UpdateStatement::new(
            TableSource::table("a"),
            vec![Assignment::qualified("b", "y", Expr::column("a", "x"))],
        )
        .join(Join::left(TableSource::table("b")).on(Expr::eq(
            Expr::column("a", "id"),
            Expr::column("b", "a_id"),
        )));
        let affected = update(&stmt, &ctx, &[]).unwrap();
        // a.id = 2 has no partner; its empty b sub-row is skipped.
        assert_eq!(affected["b"].keys, vec![vec![Value::Int64(7)]]);
        assert_eq!(affected["a"].count, 0);
        assert_eq!(
            rows(&storage, "b"),
            vec![vec![Value::Int64(7), Value::Int64(1), Value::Int64(10)]]
        );
    }

    #[test]
    fn test_update_unknown_column() {
        let (catalog, storage) = setup(&[(1, 10)], &[]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let stmt = UpdateStatement::new(
            TableSource::table("a"),
            vec![Assignment::new("nope", Expr::literal(1i64))],
        );
        let err = update(&stmt, &ctx, &[]).unwrap_err();
        assert!(matches!(
            err.as_schema_error(),
            Some(SchemaError::ColumnNotFound { .. })
        ));

        let stmt = UpdateStatement::new(
            TableSource::table("a"),
            vec![Assignment::qualified("q", "x", Expr::literal(1i64))],
        );
        let err = update(&stmt, &ctx, &[]).unwrap_err();
        assert!(matches!(
            err.as_schema_error(),
            Some(SchemaError::UnknownAlias { .. })
        ));
    }
}
