//! DELETE.

use super::AffectedMap;
use crate::ast::{DeleteStatement, Join, TableSource};
use crate::context::ExecutionContext;
use crate::engine::JoinCursorEngine;
use crate::path::rewrite_delete;
use crate::statement::AffectedRows;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashSet;
use skein_core::{Error, KeyTuple, Result, Value};
use tracing::debug;

/// Keys collected for one delete target, deduplicated in first-seen order.
struct TargetKeys {
    alias: String,
    seen: HashSet<KeyTuple>,
    keys: Vec<KeyTuple>,
}

impl TargetKeys {
    fn new(alias: String) -> Self {
        Self {
            alias,
            seen: HashSet::new(),
            keys: Vec::new(),
        }
    }

    fn push(&mut self, key: KeyTuple) {
        if self.seen.insert(key.clone()) {
            self.keys.push(key);
        }
    }
}

/// Deletes the rows matched by `stmt` from each of its targets.
///
/// Targets are the explicit delete list, else every FROM alias when USING
/// supplies the sources, else the first FROM table.
pub fn delete(
    stmt: &DeleteStatement,
    ctx: &ExecutionContext<'_>,
    params: &[Value],
) -> Result<AffectedMap> {
    let mut stmt = stmt.clone();
    rewrite_delete(&mut stmt, ctx)?;

    if stmt.using.is_some() && !stmt.targets.is_empty() {
        return Err(Error::validation(
            "DELETE cannot combine a target list with USING",
        ));
    }
    let first = stmt
        .from
        .first()
        .ok_or_else(|| Error::validation("DELETE requires a source"))?;
    let targets: Vec<String> = if !stmt.targets.is_empty() {
        stmt.targets.clone()
    } else if stmt.using.is_some() {
        stmt.from.iter().map(|s| s.alias().to_string()).collect()
    } else {
        vec![first.alias().to_string()]
    };

    let (main, joins): (&TableSource, Vec<Join>) = match &stmt.using {
        Some(using) => (&using.source, using.joins.clone()),
        None => {
            let mut joins: Vec<Join> = stmt.from[1..].iter().cloned().map(Join::inner).collect();
            joins.extend(stmt.joins.iter().cloned());
            (first, joins)
        }
    };

    let mut engine = JoinCursorEngine::new(main, &joins, stmt.where_clause.as_ref(), params);
    engine.init(ctx)?;

    let mut collected = Vec::with_capacity(targets.len());
    for alias in targets {
        let store = engine.store(&alias).ok_or_else(|| {
            Error::validation(format!("DELETE target {} is not among the sources", alias))
        })?;
        collected.push((TargetKeys::new(alias), store));
    }

    while let Some(comp) = engine.fetch()? {
        for (target, store) in &mut collected {
            if let Some(row) = comp.get(&target.alias) {
                let key = store.borrow().key_of(row);
                target.push(key);
            }
        }
    }

    let mut affected = AffectedMap::new();
    for (target, store) in collected {
        let count = store.borrow_mut().delete_all(&target.keys)?;
        debug!(alias = target.alias.as_str(), count, "rows deleted");
        affected.insert(
            target.alias,
            AffectedRows {
                count,
                keys: target.keys,
            },
        );
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::mutation::fixtures::{rows, setup};

    fn a_join_b() -> Join {
        Join::inner(TableSource::table("b")).on(Expr::eq(
            Expr::column("a", "id"),
            Expr::column("b", "a_id"),
        ))
    }

    #[test]
    fn test_delete_where() {
        let (catalog, storage) = setup(&[(1, 10), (2, 20), (3, 30)], &[]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let stmt = DeleteStatement::new(TableSource::table("a"))
            .filter(Expr::ge(Expr::col("x"), Expr::literal(20i64)));
        let affected = delete(&stmt, &ctx, &[]).unwrap();
        assert_eq!(affected["a"].count, 2);
        assert_eq!(
            affected["a"].keys,
            vec![vec![Value::Int64(2)], vec![Value::Int64(3)]]
        );
        assert_eq!(rows(&storage, "a"), vec![vec![Value::Int64(1), Value::Int64(10)]]);
    }

    #[test]
    fn test_delete_deduplicates_keys() {
        // a.id = 1 matches two rows of b.
        let (catalog, storage) = setup(&[(1, 10), (2, 20)], &[(1, 1, 0), (2, 1, 0)]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let stmt = DeleteStatement::new(TableSource::table("a")).join(a_join_b());
        let affected = delete(&stmt, &ctx, &[]).unwrap();
        assert_eq!(affected["a"].keys, vec![vec![Value::Int64(1)]]);
        assert_eq!(affected["a"].count, 1);
        assert_eq!(rows(&storage, "b").len(), 2);
    }

    #[test]
    fn test_delete_multiple_targets() {
        let (catalog, storage) = setup(&[(1, 10), (2, 20)], &[(7, 1, 0), (8, 2, 5)]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let stmt = DeleteStatement::new(TableSource::table("a"))
            .target("a")
            .target("b")
            .join(a_join_b())
            .filter(Expr::eq(Expr::column("b", "y"), Expr::literal(5i64)));
        let affected = delete(&stmt, &ctx, &[]).unwrap();
        assert_eq!(affected["a"].count, 1);
        assert_eq!(affected["b"].count, 1);
        assert_eq!(rows(&storage, "a"), vec![vec![Value::Int64(1), Value::Int64(10)]]);
        assert_eq!(rows(&storage, "b").len(), 1);
    }

    #[test]
    fn test_delete_target_validation() {
        let (catalog, storage) = setup(&[(1, 10)], &[]);
        let ctx = ExecutionContext::new(&catalog, &storage);

        let unknown = DeleteStatement::new(TableSource::table("a")).target("z");
        assert!(matches!(
            delete(&unknown, &ctx, &[]),
            Err(Error::Validation { .. })
        ));

        let mixed = DeleteStatement::new(TableSource::table("a"))
            .target("a")
            .using(TableSource::table("a"), vec![a_join_b()]);
        assert!(matches!(
            delete(&mixed, &ctx, &[]),
            Err(Error::Validation { .. })
        ));
        assert_eq!(rows(&storage, "a").len(), 1);
    }
}
