//! The join cursor engine.
//!
//! One cursor per source, chained like an odometer: every candidate advances
//! the first join cursor; a join cursor that is already at end-of-data
//! rewinds and carries into the next one, and the last carries into the main
//! cursor. Each join cursor therefore visits its end-of-data position once
//! per cycle, which is where LEFT joins emit their unmatched rows. After the
//! main cursor runs out, RIGHT and FULL joins get one more cycle with an
//! empty main sub-row to emit join rows that never matched.

use crate::ast::{Expr, Join, JoinCondition, JoinType, TableSource};
use crate::compose::RowComposition;
use crate::context::ExecutionContext;
use crate::eval::{evaluate_predicate, Scope};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashSet;
use skein_core::{Error, KeyTuple, Result, Row, SchemaError, Value};
use skein_storage::{open_cursor, Cursor, StoreRef};
use tracing::{debug, trace};

/// Match bookkeeping for one join.
///
/// A match records the positions of the main cursor and every preceding join
/// cursor (the prefix) and the position of the join cursor itself. LEFT
/// joins consult the prefixes, RIGHT joins the join positions.
#[derive(Debug, Default)]
pub struct JoinMatchState {
    matched_prefixes: HashSet<Vec<usize>>,
    matched_rows: HashSet<usize>,
}

impl JoinMatchState {
    fn record(&mut self, prefix: &[usize], position: usize) {
        if !self.matched_prefixes.contains(prefix) {
            self.matched_prefixes.insert(prefix.to_vec());
        }
        self.matched_rows.insert(position);
    }

    /// Returns true if some join row matched this prefix.
    pub fn prefix_matched(&self, prefix: &[usize]) -> bool {
        self.matched_prefixes.contains(prefix)
    }

    /// Returns true if the join row at `position` matched anything.
    pub fn row_matched(&self, position: usize) -> bool {
        self.matched_rows.contains(&position)
    }
}

struct SourceCursor {
    alias: String,
    columns: Rc<[String]>,
    store: StoreRef,
    cursor: Box<dyn Cursor>,
    hidden: bool,
}

impl SourceCursor {
    fn open(
        source: &TableSource,
        hidden: bool,
        ctx: &ExecutionContext<'_>,
        params: &[Value],
    ) -> Result<Self> {
        let store = source.eval(ctx, params)?;
        let columns: Rc<[String]> = store.borrow().columns().to_vec().into();
        let cursor = open_cursor(&store);
        Ok(Self {
            alias: source.alias().to_string(),
            columns,
            store,
            cursor,
            hidden,
        })
    }

    fn push_into(&self, comp: &mut RowComposition, row: Option<Rc<Row>>) {
        if self.hidden {
            comp.push_hidden(self.alias.as_str(), Rc::clone(&self.columns), row);
        } else {
            comp.push(self.alias.as_str(), Rc::clone(&self.columns), row);
        }
    }
}

struct JoinCursor<'s> {
    source: SourceCursor,
    join_type: JoinType,
    condition: Option<&'s JoinCondition>,
    state: JoinMatchState,
}

impl JoinCursor<'_> {
    fn matches(&self, comp: &RowComposition, main_alias: &str, params: &[Value]) -> Result<bool> {
        match self.condition {
            None => Ok(true),
            Some(JoinCondition::Using(column)) => {
                let using = || -> Result<bool> {
                    let left = comp.column(main_alias, column)?;
                    let right = comp.column(&self.source.alias, column)?;
                    Ok(!left.is_null() && !right.is_null() && left.cmp(&right).is_eq())
                };
                using().map_err(|e| Error::condition(format!("USING ({})", column), e))
            }
            Some(JoinCondition::On(expr)) => evaluate_predicate(expr, &Scope::new(comp, params))
                .map_err(|e| Error::condition(expr.to_string(), e)),
        }
    }
}

/// Streams composed rows of a main source and its joins.
pub struct JoinCursorEngine<'s> {
    main_source: &'s TableSource,
    join_specs: &'s [Join],
    where_clause: Option<&'s Expr>,
    params: &'s [Value],
    main: Option<SourceCursor>,
    joins: Vec<JoinCursor<'s>>,
    /// Index of the first RIGHT or FULL join.
    right_start: Option<usize>,
    finished: bool,
}

impl<'s> JoinCursorEngine<'s> {
    /// Creates an engine. Sources are evaluated by [`init`](Self::init).
    pub fn new(
        main: &'s TableSource,
        joins: &'s [Join],
        where_clause: Option<&'s Expr>,
        params: &'s [Value],
    ) -> Self {
        Self {
            main_source: main,
            join_specs: joins,
            where_clause,
            params,
            main: None,
            joins: Vec::new(),
            right_start: None,
            finished: false,
        }
    }

    /// Evaluates every source and opens its cursor.
    pub fn init(&mut self, ctx: &ExecutionContext<'_>) -> Result<()> {
        let mut aliases = HashSet::new();
        for alias in core::iter::once(self.main_source.alias())
            .chain(self.join_specs.iter().map(|j| j.source.alias()))
        {
            if !aliases.insert(alias) {
                return Err(Error::validation(format!("duplicate table alias {}", alias)));
            }
        }

        let main = SourceCursor::open(self.main_source, false, ctx, self.params)?;
        let mut joins = Vec::with_capacity(self.join_specs.len());
        for join in self.join_specs {
            joins.push(JoinCursor {
                source: SourceCursor::open(&join.source, join.implicit, ctx, self.params)?,
                join_type: join.join_type,
                condition: join.condition.as_ref(),
                state: JoinMatchState::default(),
            });
        }
        self.right_start = joins
            .iter()
            .position(|j| j.join_type.keeps_unmatched_join());
        self.finished = main.cursor.eof() && self.right_start.is_none();
        self.main = Some(main);
        self.joins = joins;
        Ok(())
    }

    /// Returns true once the main cursor has run past its end.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the next composed row that satisfies the joins and WHERE.
    pub fn fetch(&mut self) -> Result<Option<RowComposition>> {
        if self.main.is_none() {
            return Err(Error::invalid_operation("join engine fetched before init"));
        }
        loop {
            if self.finished {
                return Ok(None);
            }
            let candidate = self.candidate()?;
            self.advance()?;
            let Some(comp) = candidate else {
                trace!("candidate rejected by join condition");
                continue;
            };
            if self.passes_where(&comp)? {
                return Ok(Some(comp));
            }
            trace!("candidate rejected by WHERE");
        }
    }

    /// Fetches every remaining row.
    pub fn collect(&mut self) -> Result<Vec<RowComposition>> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch()? {
            rows.push(row);
        }
        Ok(rows)
    }

    fn passes_where(&self, comp: &RowComposition) -> Result<bool> {
        match self.where_clause {
            None => Ok(true),
            Some(expr) => evaluate_predicate(expr, &Scope::new(comp, self.params))
                .map_err(|e| Error::condition(expr.to_string(), e)),
        }
    }

    /// Builds the composition for the current cursor positions, or `None`
    /// if the positions do not form a row.
    fn candidate(&mut self) -> Result<Option<RowComposition>> {
        let Some(main) = self.main.as_ref() else {
            return Ok(None);
        };
        let main_row = main.cursor.fetch()?;
        let main_eof = main_row.is_none();
        let mut comp = RowComposition::new();
        main.push_into(&mut comp, main_row);
        let mut prefix = vec![main.cursor.position()];

        for (i, join) in self.joins.iter_mut().enumerate() {
            let row = join.source.cursor.fetch()?;
            let position = join.source.cursor.position();

            // Once the main cursor is exhausted, everything left of the
            // first RIGHT/FULL join is outer-null.
            if main_eof && self.right_start.is_some_and(|start| i < start) {
                if row.is_some() {
                    return Ok(None);
                }
                join.source.push_into(&mut comp, None);
                prefix.push(position);
                continue;
            }

            match row {
                // Right-outer phase: only join rows that never matched.
                Some(row) if main_eof && join.join_type.keeps_unmatched_join() => {
                    if join.state.row_matched(position) {
                        return Ok(None);
                    }
                    join.source.push_into(&mut comp, Some(row));
                }
                Some(row) => {
                    join.source.push_into(&mut comp, Some(row));
                    if join.matches(&comp, &main.alias, self.params)? {
                        join.state.record(&prefix, position);
                    } else {
                        return Ok(None);
                    }
                }
                None => {
                    if join.join_type.keeps_unmatched_main()
                        && comp.has_rows()
                        && !join.state.prefix_matched(&prefix)
                    {
                        join.source.push_into(&mut comp, None);
                    } else {
                        return Ok(None);
                    }
                }
            }
            prefix.push(position);
        }
        Ok(Some(comp))
    }

    /// Moves exactly one cursor, carrying along the chain.
    fn advance(&mut self) -> Result<()> {
        for join in &mut self.joins {
            if join.source.cursor.eof() {
                join.source.cursor.rewind()?;
                continue;
            }
            return join.source.cursor.next();
        }
        let Some(main) = self.main.as_mut() else {
            self.finished = true;
            return Ok(());
        };
        if main.cursor.eof() {
            self.finished = true;
        } else {
            main.cursor.next()?;
            self.finished = main.cursor.eof() && self.right_start.is_none();
        }
        if self.finished {
            debug!(alias = %main.alias, joins = self.joins.len(), "join engine finished");
        }
        Ok(())
    }

    fn source_mut(&mut self, alias: &str) -> Option<&mut SourceCursor> {
        if let Some(main) = self.main.as_mut().filter(|m| m.alias == alias) {
            return Some(main);
        }
        self.joins
            .iter_mut()
            .map(|j| &mut j.source)
            .find(|s| s.alias == alias)
    }

    fn source(&self, alias: &str) -> Option<&SourceCursor> {
        self.main
            .iter()
            .chain(self.joins.iter().map(|j| &j.source))
            .find(|s| s.alias == alias)
    }

    /// Stages a replacement row on the cursor of `alias`.
    pub fn stage_update(&mut self, alias: &str, row: Row) -> Result<()> {
        let source = self.source_mut(alias).ok_or_else(|| SchemaError::UnknownAlias {
            alias: alias.to_string(),
        })?;
        source.cursor.stage(row)
    }

    /// Persists staged rows on every cursor and returns `alias → keys`.
    pub fn sync_cursors(&mut self) -> Result<BTreeMap<String, Vec<KeyTuple>>> {
        let mut out = BTreeMap::new();
        let sources = self
            .main
            .iter_mut()
            .chain(self.joins.iter_mut().map(|j| &mut j.source));
        for source in sources {
            let keys = source.cursor.sync()?;
            out.insert(source.alias.clone(), keys);
        }
        Ok(out)
    }

    /// Returns the store behind `alias`.
    pub fn store(&self, alias: &str) -> Option<StoreRef> {
        self.source(alias).map(|s| Rc::clone(&s.store))
    }

    /// Returns the column names of `alias`.
    pub fn columns(&self, alias: &str) -> Option<Rc<[String]>> {
        self.source(alias).map(|s| Rc::clone(&s.columns))
    }

    /// Returns the aliases of every source, main first.
    pub fn aliases(&self) -> Vec<&str> {
        self.main
            .iter()
            .chain(self.joins.iter().map(|j| &j.source))
            .map(|s| s.alias.as_str())
            .collect()
    }

    /// Returns a composition with every sub-row outer-null.
    pub fn empty_composition(&self) -> RowComposition {
        let mut comp = RowComposition::new();
        for source in self
            .main
            .iter()
            .chain(self.joins.iter().map(|j| &j.source))
        {
            source.push_into(&mut comp, None);
        }
        comp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Join};
    use skein_core::schema::{SchemaCatalog, TableBuilder};
    use skein_core::DataType;
    use skein_storage::{MemoryStorage, Storage, Store};

    /// a(id, x) and b(id, a_id, y).
    fn setup(a_rows: &[(i64, i64)], b_rows: &[(i64, Option<i64>, i64)]) -> (SchemaCatalog, MemoryStorage) {
        let a = TableBuilder::new("a")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("x", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], false)
            .unwrap()
            .build()
            .unwrap();
        let b = TableBuilder::new("b")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("a_id", DataType::Int64)
            .unwrap()
            .add_column("y", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], false)
            .unwrap()
            .build()
            .unwrap();
        let mut catalog = SchemaCatalog::new("main");
        catalog.register("main", a).unwrap();
        catalog.register("main", b).unwrap();
        let storage = MemoryStorage::from_catalog(&catalog);

        let cols = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        storage
            .store("main", "a")
            .unwrap()
            .borrow_mut()
            .add_all(
                a_rows
                    .iter()
                    .map(|(id, x)| vec![Value::Int64(*id), Value::Int64(*x)])
                    .collect(),
                &cols(&["id", "x"]),
                None,
            )
            .unwrap();
        storage
            .store("main", "b")
            .unwrap()
            .borrow_mut()
            .add_all(
                b_rows
                    .iter()
                    .map(|(id, a_id, y)| {
                        vec![
                            Value::Int64(*id),
                            a_id.map(Value::Int64).unwrap_or(Value::Null),
                            Value::Int64(*y),
                        ]
                    })
                    .collect(),
                &cols(&["id", "a_id", "y"]),
                None,
            )
            .unwrap();
        (catalog, storage)
    }

    fn on_a_id() -> Expr {
        Expr::eq(Expr::column("a", "id"), Expr::column("b", "a_id"))
    }

    fn run(
        catalog: &SchemaCatalog,
        storage: &MemoryStorage,
        joins: &[Join],
        where_clause: Option<&Expr>,
    ) -> Result<Vec<RowComposition>> {
        let ctx = ExecutionContext::new(catalog, storage);
        let main = TableSource::table("a");
        let mut engine = JoinCursorEngine::new(&main, joins, where_clause, &[]);
        engine.init(&ctx)?;
        let rows = engine.collect()?;
        assert!(engine.is_finished());
        assert!(engine.fetch()?.is_none());
        Ok(rows)
    }

    fn ids(rows: &[RowComposition], alias: &str) -> Vec<Option<i64>> {
        rows.iter()
            .map(|r| r.get(alias).and_then(|row| row.get(0)).and_then(Value::as_i64))
            .collect()
    }

    #[test]
    fn test_single_source() {
        let (catalog, storage) = setup(&[(1, 10), (2, 20)], &[]);
        let rows = run(&catalog, &storage, &[], None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_inner_join_one_match_each() {
        let (catalog, storage) = setup(
            &[(1, 0), (2, 0), (3, 0)],
            &[(10, Some(3), 0), (11, Some(1), 0), (12, Some(2), 0)],
        );
        let joins = [Join::inner(TableSource::table("b")).on(on_a_id())];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(ids(&rows, "b"), vec![Some(11), Some(12), Some(10)]);
    }

    #[test]
    fn test_left_join_without_match() {
        let (catalog, storage) = setup(&[(1, 0), (2, 0)], &[(10, Some(1), 0), (11, Some(1), 0)]);
        let joins = [Join::left(TableSource::table("b")).on(on_a_id())];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1), Some(1), Some(2)]);
        assert_eq!(ids(&rows, "b"), vec![Some(10), Some(11), None]);
        assert!(rows[2].sub_row("b").unwrap().is_empty());
    }

    #[test]
    fn test_left_join_against_empty_table() {
        let (catalog, storage) = setup(&[(1, 0)], &[]);
        let joins = [Join::left(TableSource::table("b")).on(on_a_id())];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1)]);
        assert_eq!(ids(&rows, "b"), vec![None]);
    }

    #[test]
    fn test_right_join_without_main_match() {
        let (catalog, storage) = setup(&[(1, 0)], &[(10, Some(1), 0), (11, Some(9), 0)]);
        let joins = [Join::right(TableSource::table("b")).on(on_a_id())];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1), None]);
        assert_eq!(ids(&rows, "b"), vec![Some(10), Some(11)]);
        assert!(rows[1].sub_row("a").unwrap().is_empty());
    }

    #[test]
    fn test_right_join_with_empty_main() {
        let (catalog, storage) = setup(&[], &[(10, Some(1), 0)]);
        let joins = [Join::right(TableSource::table("b")).on(on_a_id())];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "b"), vec![Some(10)]);
        assert_eq!(ids(&rows, "a"), vec![None]);
    }

    #[test]
    fn test_full_join() {
        let (catalog, storage) = setup(&[(1, 0), (2, 0)], &[(10, Some(1), 0), (11, Some(9), 0)]);
        let joins = [Join::full(TableSource::table("b")).on(on_a_id())];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1), Some(2), None]);
        assert_eq!(ids(&rows, "b"), vec![Some(10), None, Some(11)]);
    }

    #[test]
    fn test_right_join_condition_on_join_side_only() {
        let (catalog, storage) = setup(&[(1, 0), (2, 0)], &[(10, None, 0), (11, None, 5)]);
        let on = Expr::eq(Expr::column("b", "y"), Expr::literal(0i64));
        let joins = [Join::right(TableSource::table("b")).on(on)];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        // b.10 matched both a rows and must not come back with an empty a
        assert_eq!(ids(&rows, "a"), vec![Some(1), Some(2), None]);
        assert_eq!(ids(&rows, "b"), vec![Some(10), Some(10), Some(11)]);
    }

    #[test]
    fn test_full_join_without_condition_is_a_product() {
        let (catalog, storage) = setup(&[(1, 0), (2, 0)], &[(10, None, 0), (11, None, 0)]);
        let joins = [Join::full(TableSource::table("b"))];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1), Some(1), Some(2), Some(2)]);
        assert_eq!(ids(&rows, "b"), vec![Some(10), Some(11), Some(10), Some(11)]);
    }

    #[test]
    fn test_full_join_without_condition_over_empty_main() {
        let (catalog, storage) = setup(&[], &[(10, None, 0)]);
        let joins = [Join::full(TableSource::table("b"))];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![None]);
        assert_eq!(ids(&rows, "b"), vec![Some(10)]);
    }

    #[test]
    fn test_join_without_condition_is_a_product() {
        let (catalog, storage) = setup(&[(1, 0), (2, 0)], &[(10, None, 0), (11, None, 0)]);
        let joins = [Join::inner(TableSource::table("b"))];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_using_matches_equal_columns() {
        let (catalog, storage) = setup(&[(1, 0), (2, 0)], &[(1, None, 0), (3, None, 0)]);
        let joins = [Join::inner(TableSource::table("b")).using("id")];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1)]);
        assert_eq!(ids(&rows, "b"), vec![Some(1)]);
    }

    #[test]
    fn test_where_filters_compositions() {
        let (catalog, storage) = setup(&[(1, 5), (2, 7), (3, 5)], &[]);
        let filter = Expr::eq(Expr::col("x"), Expr::literal(5i64));
        let rows = run(&catalog, &storage, &[], Some(&filter)).unwrap();
        assert_eq!(ids(&rows, "a"), vec![Some(1), Some(3)]);
    }

    #[test]
    fn test_condition_errors_carry_clause_text() {
        let (catalog, storage) = setup(&[(1, 0)], &[(10, Some(1), 0)]);
        let bad = Expr::eq(Expr::column("a", "id"), Expr::column("b", "missing"));
        let joins = [Join::inner(TableSource::table("b")).on(bad)];
        match run(&catalog, &storage, &joins, None).unwrap_err() {
            Error::ConditionEvaluation { clause, source } => {
                assert_eq!(clause, "a.id = b.missing");
                assert!(matches!(
                    source.as_schema_error(),
                    Some(SchemaError::ColumnNotFound { .. })
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_alias() {
        let (catalog, storage) = setup(&[(1, 0)], &[]);
        let joins = [Join::inner(TableSource::table("b").with_alias("a"))];
        assert!(matches!(
            run(&catalog, &storage, &joins, None).unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[test]
    fn test_fetch_before_init() {
        let main = TableSource::table("a");
        let mut engine = JoinCursorEngine::new(&main, &[], None, &[]);
        assert!(engine.fetch().is_err());
    }

    #[test]
    fn test_left_chain_keeps_unmatched_prefixes() {
        // a LEFT JOIN b LEFT JOIN c, where c only matches b.id = 10
        let (catalog, storage) = setup(&[(1, 0)], &[(10, Some(1), 0), (11, Some(1), 0)]);
        let joins = [
            Join::left(TableSource::table("b")).on(on_a_id()),
            Join::left(TableSource::table("b").with_alias("c"))
                .on(Expr::and(
                    Expr::eq(Expr::column("c", "id"), Expr::column("b", "id")),
                    Expr::eq(Expr::column("c", "id"), Expr::literal(10i64)),
                )),
        ];
        let rows = run(&catalog, &storage, &joins, None).unwrap();
        assert_eq!(ids(&rows, "b"), vec![Some(10), Some(11)]);
        assert_eq!(ids(&rows, "c"), vec![Some(10), None]);
    }

    #[test]
    fn test_stage_and_sync() {
        let (catalog, storage) = setup(&[(1, 10)], &[]);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let main = TableSource::table("a");
        let mut engine = JoinCursorEngine::new(&main, &[], None, &[]);
        engine.init(&ctx).unwrap();
        let comp = engine.fetch().unwrap().unwrap();
        let mut row = (**comp.get("a").unwrap()).clone();
        row.set(1, Value::Int64(99));
        engine.stage_update("a", row).unwrap();
        assert!(engine.stage_update("zzz", Row::new(0, vec![])).is_err());

        let synced = engine.sync_cursors().unwrap();
        assert_eq!(synced.get("a"), Some(&vec![vec![Value::Int64(1)]]));
        let store = storage.store("main", "a").unwrap();
        assert_eq!(store.borrow().scan()[0].get(1), Some(&Value::Int64(99)));
    }
}
