//! Smart joins: arrow references materialized as implicit LEFT JOINs.
//!
//! Every distinct `(base alias, acting keys, target table)` gets one derived
//! source `SELECT <acting key>, <select> AS c1, … FROM <target>` joined as
//! `jN`. Further references sharing the key add columns to the same source,
//! so resolving a reference twice never adds a second physical join.

use super::resolver::{is_path, PathBinding, PathResolver, OUTGOING};
use crate::ast::{
    ColumnRef, DeleteStatement, Expr, Field, Join, SelectStatement, TableSource, UpdateStatement,
};
use crate::context::ExecutionContext;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use skein_core::schema::SchemaCatalog;
use skein_core::{Error, Result, SchemaError};
use tracing::debug;

/// Identity of a smart join.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SmartJoinKey {
    pub base_alias: String,
    pub acting_key_a: String,
    pub acting_key_b: String,
    pub target: String,
}

#[derive(Debug)]
struct SmartJoinEntry {
    key: SmartJoinKey,
    database: Option<String>,
    alias: String,
    /// `(select, column alias)` in attach order.
    selects: Vec<(String, String)>,
}

/// Registry of the smart joins one statement needs.
#[derive(Debug, Default)]
pub struct SmartJoins {
    entries: Vec<SmartJoinEntry>,
    index: HashMap<SmartJoinKey, usize>,
    used_aliases: HashSet<String>,
    next_alias: usize,
}

impl SmartJoins {
    /// Creates a registry that never generates one of `used_aliases`.
    pub fn new<I, S>(used_aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            used_aliases: used_aliases.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Returns the number of joins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no join was attached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attaches `binding` to the join for its key, creating the join on first
    /// use, and returns the column serving the binding's select.
    pub fn attach(
        &mut self,
        base_alias: &str,
        database: Option<&str>,
        binding: &PathBinding,
    ) -> ColumnRef {
        let key = SmartJoinKey {
            base_alias: base_alias.to_string(),
            acting_key_a: binding.a.acting_key.clone(),
            acting_key_b: binding.b.acting_key.clone(),
            target: binding.b.table.clone(),
        };
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let alias = self.generate_alias();
                self.entries.push(SmartJoinEntry {
                    key: key.clone(),
                    database: database.map(ToString::to_string),
                    alias,
                    selects: Vec::new(),
                });
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[slot];
        let column = match entry.selects.iter().find(|(s, _)| *s == binding.b.select) {
            Some((_, column)) => column.clone(),
            None => {
                let column = format!("c{}", entry.selects.len() + 1);
                entry
                    .selects
                    .push((binding.b.select.clone(), column.clone()));
                column
            }
        };
        ColumnRef::new(entry.alias.clone(), column)
    }

    fn generate_alias(&mut self) -> String {
        loop {
            self.next_alias += 1;
            let alias = format!("j{}", self.next_alias);
            if self.used_aliases.insert(alias.clone()) {
                return alias;
            }
        }
    }

    /// Builds the LEFT JOINs, in creation order.
    pub fn into_joins(self) -> Vec<Join> {
        self.entries
            .into_iter()
            .map(|entry| {
                let key = entry.key;
                let target = match entry.database {
                    Some(db) => TableSource::qualified(db, key.target),
                    None => TableSource::table(key.target),
                };
                let mut query = SelectStatement::new(target).field(Expr::col(key.acting_key_b.as_str()));
                for (select, column) in entry.selects {
                    let expr = if is_path(&select) {
                        Expr::path(select)
                    } else {
                        Expr::col(select)
                    };
                    query = query.field_as(expr, column);
                }
                let condition = Expr::eq(
                    Expr::column(entry.alias.as_str(), key.acting_key_b.as_str()),
                    Expr::column(key.base_alias, key.acting_key_a),
                );
                let mut join = Join::left(TableSource::derived(query, entry.alias)).on(condition);
                join.implicit = true;
                join
            })
            .collect()
    }
}

struct SourceInfo {
    alias: String,
    database: Option<String>,
    table: Option<String>,
}

/// Replaces arrow references in one statement's expressions with columns of
/// smart joins.
pub struct PathRewriter<'c> {
    catalog: &'c SchemaCatalog,
    resolver: PathResolver<'c>,
    ctx_database: String,
    sources: Vec<SourceInfo>,
    joins: SmartJoins,
}

impl<'c> PathRewriter<'c> {
    /// Creates a rewriter for a statement whose main source is the first of
    /// `sources`.
    pub fn new<'s>(
        ctx: &ExecutionContext<'c>,
        sources: impl IntoIterator<Item = &'s TableSource>,
    ) -> Self {
        let sources: Vec<SourceInfo> = sources
            .into_iter()
            .map(|source| match source {
                TableSource::Table {
                    database, name, ..
                } => SourceInfo {
                    alias: source.alias().to_string(),
                    database: database.clone(),
                    table: Some(name.clone()),
                },
                TableSource::Derived { alias, .. } => SourceInfo {
                    alias: alias.clone(),
                    database: None,
                    table: None,
                },
            })
            .collect();
        let joins = SmartJoins::new(sources.iter().map(|s| s.alias.clone()));
        Self {
            catalog: ctx.catalog(),
            resolver: PathResolver::new(ctx.catalog()),
            ctx_database: ctx.database().to_string(),
            sources,
            joins,
        }
    }

    fn base(&self, alias: Option<&str>) -> Result<&SourceInfo> {
        let source = match alias {
            Some(alias) => self
                .sources
                .iter()
                .find(|s| s.alias == alias)
                .ok_or_else(|| SchemaError::UnknownAlias {
                    alias: alias.to_string(),
                })?,
            None => self
                .sources
                .first()
                .ok_or_else(|| Error::validation("statement has no source"))?,
        };
        if source.table.is_none() {
            return Err(Error::validation(format!(
                "arrow references cannot start from derived source {}",
                source.alias
            )));
        }
        Ok(source)
    }

    fn resolve(&self, alias: Option<&str>, path: &str) -> Result<(String, Option<String>, PathBinding)> {
        let base = self.base(alias)?;
        let database = base.database.as_deref().unwrap_or(&self.ctx_database);
        let table = base.table.as_deref().unwrap_or_default();
        let binding = self.resolver.resolve(database, Some(table), path)?;
        Ok((base.alias.clone(), base.database.clone(), binding))
    }

    /// Follows nested selects to the binding that names the final column.
    fn terminal(&self, database: Option<&str>, binding: &PathBinding) -> Result<PathBinding> {
        let database = database.unwrap_or(&self.ctx_database);
        let mut current = binding.clone();
        while current.is_nested() {
            current = self
                .resolver
                .resolve(database, Some(&current.b.table), &current.b.select)?;
        }
        Ok(current)
    }

    fn replace(&mut self, alias: Option<&str>, path: &str) -> Result<Expr> {
        let (base_alias, database, binding) = self.resolve(alias, path)?;
        if self.terminal(database.as_deref(), &binding)?.selects_all() {
            return Err(Error::validation(format!(
                "{} selects every column and is only allowed as a field",
                path
            )));
        }
        let column = self.joins.attach(&base_alias, database.as_deref(), &binding);
        Ok(Expr::Column(column))
    }

    /// Rewrites every arrow reference inside `expr`.
    pub fn rewrite_expr(&mut self, expr: &mut Expr) -> Result<()> {
        if !expr.has_path() {
            return Ok(());
        }
        expr.try_visit_mut(&mut |node| {
            if let Expr::Path { table, path } = node {
                let (table, path) = (table.clone(), path.clone());
                *node = self.replace(table.as_deref(), &path)?;
            }
            Ok(())
        })
    }

    /// Rewrites a field list. A field consisting of a `*` reference expands
    /// to one field per column of the final target table; rewritten fields
    /// keep their original text as their output name.
    pub fn rewrite_fields(&mut self, fields: Vec<Field>) -> Result<Vec<Field>> {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            match field {
                Field::Expr {
                    expr: Expr::Path { table, path },
                    alias,
                } => {
                    let (_, database, binding) = self.resolve(table.as_deref(), &path)?;
                    let terminal = self.terminal(database.as_deref(), &binding)?;
                    if terminal.selects_all() {
                        let db = database.as_deref().unwrap_or(&self.ctx_database);
                        let columns = self.catalog.lookup(db, &terminal.b.table)?.field_names();
                        let stem = path.strip_suffix('*').map(String::from).unwrap_or_else(|| {
                            format!("{}{}", path, OUTGOING)
                        });
                        for column in columns {
                            let expanded = format!("{}{}", stem, column);
                            let expr = self.replace(table.as_deref(), &expanded)?;
                            out.push(Field::Expr {
                                expr,
                                alias: Some(expanded),
                            });
                        }
                    } else {
                        let expr = self.replace(table.as_deref(), &path)?;
                        out.push(Field::Expr {
                            expr,
                            alias: Some(alias.unwrap_or(path)),
                        });
                    }
                }
                Field::Expr { mut expr, alias } if expr.has_path() => {
                    let alias = alias.unwrap_or_else(|| format!("{}", expr));
                    self.rewrite_expr(&mut expr)?;
                    out.push(Field::Expr {
                        expr,
                        alias: Some(alias),
                    });
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }

    /// Returns the smart joins created so far.
    pub fn finish(self) -> Vec<Join> {
        if !self.joins.is_empty() {
            debug!(joins = self.joins.len(), "materialized smart joins");
        }
        self.joins.into_joins()
    }
}

fn select_has_paths(stmt: &SelectStatement) -> bool {
    let field_paths = stmt.fields.iter().any(|f| match f {
        Field::Expr { expr, .. } => expr.has_path(),
        Field::Wildcard(_) => false,
    });
    field_paths
        || stmt.where_clause.as_ref().is_some_and(Expr::has_path)
        || stmt.group_by.iter().any(Expr::has_path)
        || stmt.having.as_ref().is_some_and(Expr::has_path)
        || stmt.order_by.iter().any(|o| o.expr.has_path())
        || stmt.windows.iter().any(|(_, spec)| {
            spec.partition_by.iter().any(Expr::has_path)
                || spec.order_by.iter().any(|o| o.expr.has_path())
        })
}

/// Rewrites the arrow references of a SELECT into smart joins.
pub fn rewrite_select(stmt: &mut SelectStatement, ctx: &ExecutionContext<'_>) -> Result<()> {
    if !select_has_paths(stmt) {
        return Ok(());
    }
    let mut rewriter = PathRewriter::new(
        ctx,
        stmt.from.iter().chain(stmt.joins.iter().map(|j| &j.source)),
    );
    let fields = core::mem::take(&mut stmt.fields);
    stmt.fields = rewriter.rewrite_fields(fields)?;
    if let Some(expr) = &mut stmt.where_clause {
        rewriter.rewrite_expr(expr)?;
    }
    for expr in &mut stmt.group_by {
        rewriter.rewrite_expr(expr)?;
    }
    if let Some(expr) = &mut stmt.having {
        rewriter.rewrite_expr(expr)?;
    }
    for order in &mut stmt.order_by {
        rewriter.rewrite_expr(&mut order.expr)?;
    }
    for (_, spec) in &mut stmt.windows {
        for expr in &mut spec.partition_by {
            rewriter.rewrite_expr(expr)?;
        }
        for order in &mut spec.order_by {
            rewriter.rewrite_expr(&mut order.expr)?;
        }
    }
    let joins = rewriter.finish();
    stmt.joins.extend(joins);
    Ok(())
}

/// Rewrites the arrow references of an UPDATE's WHERE and SET expressions.
pub fn rewrite_update(stmt: &mut UpdateStatement, ctx: &ExecutionContext<'_>) -> Result<()> {
    let has_paths = stmt.where_clause.as_ref().is_some_and(Expr::has_path)
        || stmt.set.iter().any(|a| a.value.has_path());
    if !has_paths {
        return Ok(());
    }
    let mut rewriter = PathRewriter::new(
        ctx,
        core::iter::once(&stmt.target).chain(stmt.joins.iter().map(|j| &j.source)),
    );
    if let Some(expr) = &mut stmt.where_clause {
        rewriter.rewrite_expr(expr)?;
    }
    for assignment in &mut stmt.set {
        rewriter.rewrite_expr(&mut assignment.value)?;
    }
    let joins = rewriter.finish();
    stmt.joins.extend(joins);
    Ok(())
}

/// Rewrites the arrow references of a DELETE's WHERE clause.
pub fn rewrite_delete(stmt: &mut DeleteStatement, ctx: &ExecutionContext<'_>) -> Result<()> {
    let Some(where_clause) = stmt.where_clause.as_mut() else {
        return Ok(());
    };
    if !where_clause.has_path() {
        return Ok(());
    }
    match &mut stmt.using {
        Some(using) => {
            let mut rewriter = PathRewriter::new(
                ctx,
                core::iter::once(&using.source).chain(using.joins.iter().map(|j| &j.source)),
            );
            rewriter.rewrite_expr(where_clause)?;
            let joins = rewriter.finish();
            using.joins.extend(joins);
        }
        None => {
            let mut rewriter = PathRewriter::new(
                ctx,
                stmt.from.iter().chain(stmt.joins.iter().map(|j| &j.source)),
            );
            rewriter.rewrite_expr(where_clause)?;
            let joins = rewriter.finish();
            stmt.joins.extend(joins);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SortOrder;
    use crate::path::resolver::{BindingSide, TargetSide};
    use alloc::string::ToString;
    use alloc::vec;
    use skein_core::schema::TableBuilder;
    use skein_core::DataType;
    use skein_storage::MemoryStorage;

    fn catalog() -> SchemaCatalog {
        let orgs = TableBuilder::new("orgs")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("name", DataType::String)
            .unwrap()
            .add_column("city", DataType::String)
            .unwrap()
            .add_primary_key(&["id"], true)
            .unwrap()
            .build()
            .unwrap();
        let users = TableBuilder::new("users")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("org_id", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"], true)
            .unwrap()
            .add_foreign_key("org_id", "orgs")
            .unwrap()
            .build()
            .unwrap();
        let mut catalog = SchemaCatalog::new("main");
        catalog.register("main", orgs).unwrap();
        catalog.register("main", users).unwrap();
        catalog
    }

    fn binding(select: &str) -> PathBinding {
        PathBinding {
            a: BindingSide {
                table: "users".into(),
                acting_key: "org_id".into(),
            },
            b: TargetSide {
                table: "orgs".into(),
                acting_key: "id".into(),
                select: select.into(),
            },
        }
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut joins = SmartJoins::new(["users"]);
        let first = joins.attach("users", None, &binding("name"));
        let again = joins.attach("users", None, &binding("name"));
        let other = joins.attach("users", None, &binding("city"));
        assert_eq!(first, again);
        assert_eq!(first, ColumnRef::new("j1", "c1"));
        assert_eq!(other, ColumnRef::new("j1", "c2"));
        assert_eq!(joins.len(), 1);
    }

    #[test]
    fn test_generated_aliases_skip_used_ones() {
        let mut joins = SmartJoins::new(["users", "j1"]);
        let column = joins.attach("users", None, &binding("name"));
        assert_eq!(column.table.as_deref(), Some("j2"));
    }

    #[test]
    fn test_into_joins_display() {
        let mut joins = SmartJoins::new(["users"]);
        joins.attach("users", None, &binding("name"));
        let joins = joins.into_joins();
        assert_eq!(joins.len(), 1);
        assert!(joins[0].implicit);
        assert_eq!(
            joins[0].to_string(),
            "LEFT JOIN (SELECT id, name AS c1 FROM orgs) AS j1 ON j1.id = users.org_id"
        );
    }

    #[test]
    fn test_rewrite_select() {
        let catalog = catalog();
        let storage = MemoryStorage::from_catalog(&catalog);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let mut stmt = SelectStatement::new(TableSource::table("users"))
            .field(Expr::col("id"))
            .field(Expr::path("org_id~>name"))
            .filter(Expr::is_not_null(Expr::path("org_id~>name")))
            .order_by(Expr::path("org_id~>city"), SortOrder::Asc);
        rewrite_select(&mut stmt, &ctx).unwrap();

        assert_eq!(stmt.joins.len(), 1);
        assert_eq!(
            stmt.joins[0].to_string(),
            "LEFT JOIN (SELECT id, name AS c1, city AS c2 FROM orgs) AS j1 ON j1.id = users.org_id"
        );
        assert_eq!(stmt.fields[1].output_name(), "org_id~>name");
        assert_eq!(stmt.where_clause.as_ref().unwrap().to_string(), "j1.c1 IS NOT NULL");
        assert_eq!(stmt.order_by[0].expr.to_string(), "j1.c2");
    }

    #[test]
    fn test_star_expands_in_fields_only() {
        let catalog = catalog();
        let storage = MemoryStorage::from_catalog(&catalog);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let mut stmt =
            SelectStatement::new(TableSource::table("users")).field(Expr::path("org_id~>*"));
        rewrite_select(&mut stmt, &ctx).unwrap();
        let names: Vec<String> = stmt.fields.iter().map(|f| f.output_name()).collect();
        assert_eq!(names, vec!["org_id~>id", "org_id~>name", "org_id~>city"]);
        assert_eq!(stmt.joins.len(), 1);

        let mut stmt = SelectStatement::new(TableSource::table("users"))
            .field(Expr::col("id"))
            .filter(Expr::is_null(Expr::path("org_id~>*")));
        assert!(matches!(
            rewrite_select(&mut stmt, &ctx).unwrap_err(),
            Error::Validation { .. }
        ));
    }

    #[test]
    fn test_rewrite_without_paths_is_a_no_op() {
        let catalog = catalog();
        let storage = MemoryStorage::from_catalog(&catalog);
        let ctx = ExecutionContext::new(&catalog, &storage);
        let mut stmt = SelectStatement::new(TableSource::table("users")).field(Expr::col("id"));
        rewrite_select(&mut stmt, &ctx).unwrap();
        assert!(stmt.joins.is_empty());
    }
}
