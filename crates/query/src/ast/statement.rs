//! Statement AST definitions: table sources, joins, SELECT and the three
//! mutation statements.

use super::expr::{join, ColumnRef, Expr, OrderBy, SortOrder, WindowSpec};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A table source: a base table or a derived query.
#[derive(Clone, Debug)]
pub enum TableSource {
    /// `[database.]name [AS alias]`.
    Table {
        database: Option<String>,
        name: String,
        alias: Option<String>,
    },
    /// `(SELECT …) AS alias`.
    Derived {
        query: Box<SelectStatement>,
        alias: String,
    },
}

impl TableSource {
    /// References a table in the default database.
    pub fn table(name: impl Into<String>) -> Self {
        TableSource::Table {
            database: None,
            name: name.into(),
            alias: None,
        }
    }

    /// References a table in `database`.
    pub fn qualified(database: impl Into<String>, name: impl Into<String>) -> Self {
        TableSource::Table {
            database: Some(database.into()),
            name: name.into(),
            alias: None,
        }
    }

    /// Wraps a query as a derived source.
    pub fn derived(query: SelectStatement, alias: impl Into<String>) -> Self {
        TableSource::Derived {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    /// Sets the alias.
    pub fn with_alias(mut self, new_alias: impl Into<String>) -> Self {
        match &mut self {
            TableSource::Table { alias, .. } => *alias = Some(new_alias.into()),
            TableSource::Derived { alias, .. } => *alias = new_alias.into(),
        }
        self
    }

    /// Returns the alias, defaulting to the table name.
    pub fn alias(&self) -> &str {
        match self {
            TableSource::Table { name, alias, .. } => alias.as_deref().unwrap_or(name),
            TableSource::Derived { alias, .. } => alias,
        }
    }

    /// Returns the table name for base table references.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            TableSource::Table { name, .. } => Some(name),
            TableSource::Derived { .. } => None,
        }
    }
}

impl fmt::Display for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSource::Table {
                database,
                name,
                alias,
            } => {
                if let Some(db) = database {
                    write!(f, "{}.", db)?;
                }
                f.write_str(name)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", alias)?;
                }
                Ok(())
            }
            TableSource::Derived { query, alias } => write!(f, "({}) AS {}", query, alias),
        }
    }
}

/// Join types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Keeps main rows without a match.
    pub fn keeps_unmatched_main(self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Keeps join rows without a match.
    pub fn keeps_unmatched_join(self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        })
    }
}

/// Join match condition.
#[derive(Clone, Debug)]
pub enum JoinCondition {
    /// `ON expr`.
    On(Expr),
    /// `USING (column)`.
    Using(String),
}

impl fmt::Display for JoinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinCondition::On(expr) => write!(f, "ON {}", expr),
            JoinCondition::Using(column) => write!(f, "USING ({})", column),
        }
    }
}

/// A joined source.
#[derive(Clone, Debug)]
pub struct Join {
    pub join_type: JoinType,
    pub source: TableSource,
    /// `None` matches every pair.
    pub condition: Option<JoinCondition>,
    /// Set on joins generated from arrow references. Their columns are only
    /// reachable through qualified references.
    pub implicit: bool,
}

impl Join {
    fn new(join_type: JoinType, source: TableSource) -> Self {
        Self {
            join_type,
            source,
            condition: None,
            implicit: false,
        }
    }

    /// INNER JOIN.
    pub fn inner(source: TableSource) -> Self {
        Self::new(JoinType::Inner, source)
    }

    /// LEFT JOIN.
    pub fn left(source: TableSource) -> Self {
        Self::new(JoinType::Left, source)
    }

    /// RIGHT JOIN.
    pub fn right(source: TableSource) -> Self {
        Self::new(JoinType::Right, source)
    }

    /// FULL JOIN.
    pub fn full(source: TableSource) -> Self {
        Self::new(JoinType::Full, source)
    }

    /// Sets an ON condition.
    pub fn on(mut self, expr: Expr) -> Self {
        self.condition = Some(JoinCondition::On(expr));
        self
    }

    /// Sets a USING column.
    pub fn using(mut self, column: impl Into<String>) -> Self {
        self.condition = Some(JoinCondition::Using(column.into()));
        self
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.join_type, self.source)?;
        if let Some(condition) = &self.condition {
            write!(f, " {}", condition)?;
        }
        Ok(())
    }
}

/// A SELECT field.
#[derive(Clone, Debug)]
pub enum Field {
    /// `expr [AS alias]`.
    Expr { expr: Expr, alias: Option<String> },
    /// `*` (`None`) or `alias.*`.
    Wildcard(Option<String>),
}

impl Field {
    /// Returns the output column name: the alias, the bare column name, the
    /// literal path text, or the expression text.
    pub fn output_name(&self) -> String {
        match self {
            Field::Expr {
                alias: Some(alias), ..
            } => alias.clone(),
            Field::Expr {
                expr: Expr::Column(col),
                ..
            } => col.column.clone(),
            Field::Expr {
                expr: Expr::Path { path, .. },
                ..
            } => path.clone(),
            Field::Expr { expr, .. } => alloc::format!("{}", expr),
            Field::Wildcard(Some(alias)) => alloc::format!("{}.*", alias),
            Field::Wildcard(None) => String::from("*"),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Expr { expr, alias: None } => write!(f, "{}", expr),
            Field::Expr {
                expr,
                alias: Some(alias),
            } if is_identifier(alias) => write!(f, "{} AS {}", expr, alias),
            Field::Expr {
                expr,
                alias: Some(alias),
            } => write!(f, "{} AS \"{}\"", expr, alias),
            Field::Wildcard(Some(alias)) => write!(f, "{}.*", alias),
            Field::Wildcard(None) => f.write_str("*"),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// LIMIT clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    /// `LIMIT count`.
    Count(usize),
    /// `LIMIT offset, count`.
    Range { offset: usize, count: usize },
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Count(count) => write!(f, "LIMIT {}", count),
            Limit::Range { offset, count } => write!(f, "LIMIT {}, {}", offset, count),
        }
    }
}

/// SELECT statement.
#[derive(Clone, Debug)]
pub struct SelectStatement {
    pub distinct: bool,
    pub fields: Vec<Field>,
    /// Comma-separated sources; the first is the main table.
    pub from: Vec<TableSource>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    /// Named windows.
    pub windows: Vec<(String, WindowSpec)>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<Limit>,
    pub offset: Option<usize>,
}

impl SelectStatement {
    /// Creates `SELECT … FROM source` with no fields yet.
    pub fn new(source: TableSource) -> Self {
        Self {
            distinct: false,
            fields: Vec::new(),
            from: alloc::vec![source],
            joins: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            windows: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Adds a field.
    pub fn field(mut self, expr: Expr) -> Self {
        self.fields.push(Field::Expr { expr, alias: None });
        self
    }

    /// Adds an aliased field.
    pub fn field_as(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.fields.push(Field::Expr {
            expr,
            alias: Some(alias.into()),
        });
        self
    }

    /// Adds `*`.
    pub fn wildcard(mut self) -> Self {
        self.fields.push(Field::Wildcard(None));
        self
    }

    /// Adds `alias.*`.
    pub fn wildcard_of(mut self, alias: impl Into<String>) -> Self {
        self.fields.push(Field::Wildcard(Some(alias.into())));
        self
    }

    /// Adds a comma-separated source.
    pub fn also_from(mut self, source: TableSource) -> Self {
        self.from.push(source);
        self
    }

    /// Adds a join.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Sets the WHERE clause.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }

    /// Adds a GROUP BY expression.
    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    /// Sets the HAVING clause.
    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(expr);
        self
    }

    /// Adds a named window.
    pub fn window(mut self, name: impl Into<String>, spec: WindowSpec) -> Self {
        self.windows.push((name.into(), spec));
        self
    }

    /// Adds an ORDER BY criterion.
    pub fn order_by(mut self, expr: Expr, order: SortOrder) -> Self {
        self.order_by.push(OrderBy { expr, order });
        self
    }

    /// Sets `LIMIT count`.
    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    /// Sets `LIMIT offset, count`.
    pub fn limit_range(mut self, offset: usize, count: usize) -> Self {
        self.limit = Some(Limit::Range { offset, count });
        self
    }

    /// Sets OFFSET.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write!(f, "{} FROM {}", join(&self.fields), join(&self.from))?;
        for j in &self.joins {
            write!(f, " {}", j)?;
        }
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {}", w)?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", join(&self.group_by))?;
        }
        if let Some(h) = &self.having {
            write!(f, " HAVING {}", h)?;
        }
        if !self.windows.is_empty() {
            f.write_str(" WINDOW ")?;
            for (i, (name, spec)) in self.windows.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{} AS ({})", name, spec)?;
            }
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", join(&self.order_by))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " {}", limit)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {}", offset)?;
        }
        Ok(())
    }
}

/// `column = expr` in SET lists and ON DUPLICATE handlers.
#[derive(Clone, Debug)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
}

impl Assignment {
    /// Assigns to an unqualified column.
    pub fn new(column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: ColumnRef::unqualified(column),
            value,
        }
    }

    /// Assigns to `table.column`.
    pub fn qualified(table: impl Into<String>, column: impl Into<String>, value: Expr) -> Self {
        Self {
            column: ColumnRef::new(table, column),
            value,
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.column, self.value)
    }
}

/// Row sources of an INSERT.
#[derive(Clone, Debug)]
pub enum InsertValues {
    /// `VALUES (…), (…)`.
    Values(Vec<Vec<Expr>>),
    /// `INSERT … SELECT`, evaluated eagerly.
    Select(Box<SelectStatement>),
    /// `SET a = 1, b = 2`.
    Set(Vec<Assignment>),
}

/// ON DUPLICATE handler of an INSERT.
#[derive(Clone, Debug)]
pub enum OnDuplicate {
    /// Keep the existing row.
    Ignore,
    /// Apply assignments to the existing row. The incoming row is visible
    /// under the `excluded` alias.
    Update(Vec<Assignment>),
}

/// INSERT statement.
#[derive(Clone, Debug)]
pub struct InsertStatement {
    pub target: TableSource,
    pub columns: Vec<String>,
    pub values: InsertValues,
    pub on_duplicate: Option<OnDuplicate>,
}

impl InsertStatement {
    /// `INSERT INTO target (columns) VALUES rows`.
    pub fn values(target: TableSource, columns: &[&str], rows: Vec<Vec<Expr>>) -> Self {
        Self {
            target,
            columns: columns.iter().map(|c| String::from(*c)).collect(),
            values: InsertValues::Values(rows),
            on_duplicate: None,
        }
    }

    /// `INSERT INTO target (columns) SELECT …`.
    pub fn select(target: TableSource, columns: &[&str], query: SelectStatement) -> Self {
        Self {
            target,
            columns: columns.iter().map(|c| String::from(*c)).collect(),
            values: InsertValues::Select(Box::new(query)),
            on_duplicate: None,
        }
    }

    /// `INSERT INTO target SET …`.
    pub fn set(target: TableSource, assignments: Vec<Assignment>) -> Self {
        Self {
            target,
            columns: Vec::new(),
            values: InsertValues::Set(assignments),
            on_duplicate: None,
        }
    }

    /// Sets the duplicate handler.
    pub fn on_duplicate(mut self, handler: OnDuplicate) -> Self {
        self.on_duplicate = Some(handler);
        self
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self.on_duplicate, Some(OnDuplicate::Ignore)) {
            write!(f, "INSERT IGNORE INTO {}", self.target)?;
        } else {
            write!(f, "INSERT INTO {}", self.target)?;
        }
        if !self.columns.is_empty() {
            write!(f, " ({})", join(&self.columns))?;
        }
        match &self.values {
            InsertValues::Values(rows) => {
                f.write_str(" VALUES ")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({})", join(row))?;
                }
            }
            InsertValues::Select(query) => write!(f, " {}", query)?,
            InsertValues::Set(assignments) => write!(f, " SET {}", join(assignments))?,
        }
        if let Some(OnDuplicate::Update(assignments)) = &self.on_duplicate {
            write!(f, " ON DUPLICATE KEY UPDATE {}", join(assignments))?;
        }
        Ok(())
    }
}

/// UPDATE statement.
#[derive(Clone, Debug)]
pub struct UpdateStatement {
    pub target: TableSource,
    pub joins: Vec<Join>,
    pub set: Vec<Assignment>,
    pub where_clause: Option<Expr>,
}

impl UpdateStatement {
    /// `UPDATE target SET …`.
    pub fn new(target: TableSource, set: Vec<Assignment>) -> Self {
        Self {
            target,
            joins: Vec::new(),
            set,
            where_clause: None,
        }
    }

    /// Adds a join.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Sets the WHERE clause.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }
}

impl fmt::Display for UpdateStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UPDATE {}", self.target)?;
        for j in &self.joins {
            write!(f, " {}", j)?;
        }
        write!(f, " SET {}", join(&self.set))?;
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {}", w)?;
        }
        Ok(())
    }
}

/// `USING main [joins…]` of a DELETE.
#[derive(Clone, Debug)]
pub struct UsingClause {
    pub source: TableSource,
    pub joins: Vec<Join>,
}

/// DELETE statement.
///
/// - `DELETE a, b FROM a JOIN b …`: explicit `targets`, sources from `from`.
/// - `DELETE FROM a USING a JOIN b …`: targets are the `from` aliases,
///   sources come from `using`.
/// - `DELETE FROM a …`: the first `from` source is the target.
#[derive(Clone, Debug)]
pub struct DeleteStatement {
    pub targets: Vec<String>,
    pub from: Vec<TableSource>,
    pub joins: Vec<Join>,
    pub using: Option<UsingClause>,
    pub where_clause: Option<Expr>,
}

impl DeleteStatement {
    /// `DELETE FROM source`.
    pub fn new(source: TableSource) -> Self {
        Self {
            targets: Vec::new(),
            from: alloc::vec![source],
            joins: Vec::new(),
            using: None,
            where_clause: None,
        }
    }

    /// Adds an explicit delete target.
    pub fn target(mut self, alias: impl Into<String>) -> Self {
        self.targets.push(alias.into());
        self
    }

    /// Adds a comma-separated FROM source.
    pub fn also_from(mut self, source: TableSource) -> Self {
        self.from.push(source);
        self
    }

    /// Adds a join to the FROM sources.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Sets the USING clause.
    pub fn using(mut self, source: TableSource, joins: Vec<Join>) -> Self {
        self.using = Some(UsingClause { source, joins });
        self
    }

    /// Sets the WHERE clause.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }
}

impl fmt::Display for DeleteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DELETE ")?;
        if !self.targets.is_empty() {
            write!(f, "{} ", join(&self.targets))?;
        }
        write!(f, "FROM {}", join(&self.from))?;
        for j in &self.joins {
            write!(f, " {}", j)?;
        }
        if let Some(using) = &self.using {
            write!(f, " USING {}", using.source)?;
            for j in &using.joins {
                write!(f, " {}", j)?;
            }
        }
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {}", w)?;
        }
        Ok(())
    }
}

/// Any evaluable statement.
#[derive(Clone, Debug)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    /// Returns the statement keyword.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(s) => write!(f, "{}", s),
            Statement::Insert(s) => write!(f, "{}", s),
            Statement::Update(s) => write!(f, "{}", s),
            Statement::Delete(s) => write!(f, "{}", s),
        }
    }
}

impl From<SelectStatement> for Statement {
    fn from(s: SelectStatement) -> Self {
        Statement::Select(s)
    }
}

impl From<InsertStatement> for Statement {
    fn from(s: InsertStatement) -> Self {
        Statement::Insert(s)
    }
}

impl From<UpdateStatement> for Statement {
    fn from(s: UpdateStatement) -> Self {
        Statement::Update(s)
    }
}

impl From<DeleteStatement> for Statement {
    fn from(s: DeleteStatement) -> Self {
        Statement::Delete(s)
    }
}
