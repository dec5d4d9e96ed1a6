//! Property-based tests for the join cursor engine.
//!
//! Row counts of every join type are checked against a nested-loop oracle
//! over randomly generated tables.

use proptest::prelude::*;
use skein_core::schema::{SchemaCatalog, TableBuilder};
use skein_core::{DataType, Value};
use skein_query::ast::{Expr, Join, JoinType, TableSource};
use skein_query::{ExecutionContext, JoinCursorEngine};
use skein_storage::{MemoryStorage, Storage, Store};

/// Join keys drawn from a small range so matches are common; `None` is NULL.
fn keys_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop::option::weighted(0.9, 0i64..6), 0..max_rows)
}

fn table(name: &str) -> skein_core::schema::TableSchema {
    TableBuilder::new(name)
        .unwrap()
        .add_column("id", DataType::Int64)
        .unwrap()
        .add_column("k", DataType::Int64)
        .unwrap()
        .add_primary_key(&["id"], false)
        .unwrap()
        .build()
        .unwrap()
}

fn setup(left: &[Option<i64>], right: &[Option<i64>]) -> (SchemaCatalog, MemoryStorage) {
    let mut catalog = SchemaCatalog::new("main");
    catalog.register("main", table("l")).unwrap();
    catalog.register("main", table("r")).unwrap();
    let storage = MemoryStorage::from_catalog(&catalog);
    for (name, keys) in [("l", left), ("r", right)] {
        let rows = keys
            .iter()
            .enumerate()
            .map(|(i, k)| vec![Value::Int64(i as i64), k.map_or(Value::Null, Value::Int64)])
            .collect();
        storage
            .store("main", name)
            .unwrap()
            .borrow_mut()
            .add_all(rows, &["id".to_string(), "k".to_string()], None)
            .unwrap();
    }
    (catalog, storage)
}

/// `ON l.k = r.k`
fn keys_equal(a: &Option<i64>, b: &Option<i64>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

/// `ON r.k = 0`, which never reads the main side.
fn right_key_zero(_: &Option<i64>, b: &Option<i64>) -> bool {
    *b == Some(0)
}

/// Expected row count of `left <join_type> right ON l.k = r.k`.
fn oracle(join_type: JoinType, left: &[Option<i64>], right: &[Option<i64>]) -> usize {
    oracle_with(join_type, left, right, keys_equal)
}

/// Expected row count of `left <join_type> right` under `matches`.
fn oracle_with(
    join_type: JoinType,
    left: &[Option<i64>],
    right: &[Option<i64>],
    matches: fn(&Option<i64>, &Option<i64>) -> bool,
) -> usize {
    let pairs: usize = left
        .iter()
        .map(|l| right.iter().filter(|r| matches(l, r)).count())
        .sum();
    let unmatched_left = left
        .iter()
        .filter(|l| !right.iter().any(|r| matches(l, r)))
        .count();
    let unmatched_right = right
        .iter()
        .filter(|r| !left.iter().any(|l| matches(l, r)))
        .count();
    match join_type {
        JoinType::Inner => pairs,
        JoinType::Left => pairs + unmatched_left,
        JoinType::Right => pairs + unmatched_right,
        JoinType::Full => pairs + unmatched_left + unmatched_right,
    }
}

fn run(join_type: JoinType, left: &[Option<i64>], right: &[Option<i64>]) -> usize {
    run_on(
        join_type,
        left,
        right,
        Expr::eq(Expr::column("l", "k"), Expr::column("r", "k")),
    )
}

fn run_on(join_type: JoinType, left: &[Option<i64>], right: &[Option<i64>], on: Expr) -> usize {
    let (catalog, storage) = setup(left, right);
    let ctx = ExecutionContext::new(&catalog, &storage);
    let main = TableSource::table("l");
    let join = match join_type {
        JoinType::Inner => Join::inner(TableSource::table("r")),
        JoinType::Left => Join::left(TableSource::table("r")),
        JoinType::Right => Join::right(TableSource::table("r")),
        JoinType::Full => Join::full(TableSource::table("r")),
    }
    .on(on);
    let joins = [join];
    let mut engine = JoinCursorEngine::new(&main, &joins, None, &[]);
    engine.init(&ctx).unwrap();
    let rows = engine.collect().unwrap();
    assert!(engine.is_finished());
    rows.len()
}

proptest! {
    /// Property: INNER join emits exactly the matching pairs.
    #[test]
    fn inner_join_count_matches_nested_loop(
        left in keys_strategy(25),
        right in keys_strategy(25),
    ) {
        prop_assert_eq!(run(JoinType::Inner, &left, &right), oracle(JoinType::Inner, &left, &right));
    }

    /// Property: LEFT join adds one row per unmatched main row.
    #[test]
    fn left_join_count_matches_nested_loop(
        left in keys_strategy(25),
        right in keys_strategy(25),
    ) {
        prop_assert_eq!(run(JoinType::Left, &left, &right), oracle(JoinType::Left, &left, &right));
    }

    /// Property: RIGHT join adds one row per unmatched join row.
    #[test]
    fn right_join_count_matches_nested_loop(
        left in keys_strategy(20),
        right in keys_strategy(20),
    ) {
        prop_assert_eq!(run(JoinType::Right, &left, &right), oracle(JoinType::Right, &left, &right));
    }

    /// Property: FULL join keeps unmatched rows of both sides.
    #[test]
    fn full_join_count_matches_nested_loop(
        left in keys_strategy(20),
        right in keys_strategy(20),
    ) {
        prop_assert_eq!(run(JoinType::Full, &left, &right), oracle(JoinType::Full, &left, &right));
    }

    /// Property: a condition on the join side alone still emits every
    /// matched join row only alongside main rows.
    #[test]
    fn join_side_condition_matches_nested_loop(
        left in keys_strategy(15),
        right in keys_strategy(15),
    ) {
        let on = || Expr::eq(Expr::column("r", "k"), Expr::literal(0i64));
        for join_type in [JoinType::Inner, JoinType::Left, JoinType::Right, JoinType::Full] {
            prop_assert_eq!(
                run_on(join_type, &left, &right, on()),
                oracle_with(join_type, &left, &right, right_key_zero)
            );
        }
    }

    /// Property: every LEFT join row carries its main sub-row.
    #[test]
    fn left_join_never_loses_main_rows(
        left in keys_strategy(20),
        right in keys_strategy(20),
    ) {
        let (catalog, storage) = setup(&left, &right);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let main = TableSource::table("l");
        let joins = [Join::left(TableSource::table("r"))
            .on(Expr::eq(Expr::column("l", "k"), Expr::column("r", "k")))];
        let mut engine = JoinCursorEngine::new(&main, &joins, None, &[]);
        engine.init(&ctx).unwrap();
        let mut seen = std::collections::BTreeSet::new();
        while let Some(comp) = engine.fetch().unwrap() {
            let row = comp.get("l");
            prop_assert!(row.is_some());
            seen.insert(row.map(|r| r.id()));
        }
        prop_assert_eq!(seen.len(), left.len());
    }
}
