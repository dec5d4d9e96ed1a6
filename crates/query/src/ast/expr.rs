//! Expression AST definitions.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use skein_core::{Result, Value};

/// Reference to a column, optionally qualified by a table alias.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Table alias (`None` for an unqualified column). The reserved alias `$`
    /// addresses the projection slot.
    pub table: Option<String>,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Creates a qualified column reference.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Creates an unqualified column reference.
    pub fn unqualified(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    /// Returns the normalized name (table.column).
    pub fn normalized_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
        }
    }

    /// Returns true for the six comparison operators.
    pub fn is_comparison(self) -> bool {
        self.precedence() == 3
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        })
    }
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

/// Aggregate and window functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    StdDev,
    GeoMean,
    /// Window only.
    RowNumber,
    /// Window only.
    Rank,
    /// Window only.
    DenseRank,
}

impl AggregateFunc {
    /// Returns true for functions that only exist over a window.
    pub fn is_window_only(self) -> bool {
        matches!(
            self,
            AggregateFunc::RowNumber | AggregateFunc::Rank | AggregateFunc::DenseRank
        )
    }

    /// Returns the SQL name.
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::StdDev => "STDDEV",
            AggregateFunc::GeoMean => "GEOMEAN",
            AggregateFunc::RowNumber => "ROW_NUMBER",
            AggregateFunc::Rank => "RANK",
            AggregateFunc::DenseRank => "DENSE_RANK",
        }
    }
}

/// Sort order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY criterion.
#[derive(Clone, Debug)]
pub struct OrderBy {
    pub expr: Expr,
    pub order: SortOrder,
}

impl OrderBy {
    /// Ascending criterion.
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            order: SortOrder::Asc,
        }
    }

    /// Descending criterion.
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            order: SortOrder::Desc,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::Asc => write!(f, "{}", self.expr),
            SortOrder::Desc => write!(f, "{} DESC", self.expr),
        }
    }
}

/// A window specification: `[base] PARTITION BY … ORDER BY …`.
#[derive(Clone, Debug, Default)]
pub struct WindowSpec {
    /// Named window this specification extends.
    pub base: Option<String>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderBy>,
}

impl WindowSpec {
    /// Creates an empty (whole-input) window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends a named window.
    pub fn extending(base: impl Into<String>) -> Self {
        Self {
            base: Some(base.into()),
            ..Self::default()
        }
    }

    /// Adds a partition expression.
    pub fn partition_by(mut self, expr: Expr) -> Self {
        self.partition_by.push(expr);
        self
    }

    /// Adds an ordering criterion.
    pub fn order_by(mut self, expr: Expr, order: SortOrder) -> Self {
        self.order_by.push(OrderBy { expr, order });
        self
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(base) = &self.base {
            f.write_str(base)?;
            sep = " ";
        }
        if !self.partition_by.is_empty() {
            write!(f, "{}PARTITION BY {}", sep, join(&self.partition_by))?;
            sep = " ";
        }
        if !self.order_by.is_empty() {
            write!(f, "{}ORDER BY {}", sep, join(&self.order_by))?;
        }
        Ok(())
    }
}

/// The OVER clause of a window function.
#[derive(Clone, Debug)]
pub enum Over {
    /// `OVER name`, resolved against the statement's WINDOW clause.
    Named(String),
    /// `OVER (…)`.
    Spec(WindowSpec),
}

impl fmt::Display for Over {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Over::Named(name) => write!(f, "OVER {}", name),
            Over::Spec(spec) => write!(f, "OVER ({})", spec),
        }
    }
}

/// Expression AST node.
#[derive(Clone, Debug)]
pub enum Expr {
    /// Column reference.
    Column(ColumnRef),
    /// Literal value.
    Literal(Value),
    /// Positional parameter (0-based).
    Param(usize),
    /// Arrow reference such as `org_id~>name`, optionally qualified by the
    /// alias it starts from. Rewritten into a column of a smart join before
    /// evaluation.
    Path { table: Option<String>, path: String },
    /// Binary operation.
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Unary operation.
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
    /// Scalar function call.
    Function { name: String, args: Vec<Expr> },
    /// Aggregate function, windowed when `over` is set.
    Aggregate {
        func: AggregateFunc,
        expr: Option<Box<Expr>>,
        distinct: bool,
        over: Option<Over>,
    },
    /// BETWEEN expression.
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    /// NOT BETWEEN expression.
    NotBetween {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    /// IN expression.
    In { expr: Box<Expr>, list: Vec<Expr> },
    /// NOT IN expression.
    NotIn { expr: Box<Expr>, list: Vec<Expr> },
    /// LIKE expression.
    Like { expr: Box<Expr>, pattern: String },
    /// NOT LIKE expression.
    NotLike { expr: Box<Expr>, pattern: String },
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn aggregate(func: AggregateFunc, expr: Option<Expr>) -> Expr {
    Expr::Aggregate {
        func,
        expr: expr.map(Box::new),
        distinct: false,
        over: None,
    }
}

impl Expr {
    /// Creates a qualified column reference expression.
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(table, column))
    }

    /// Creates an unqualified column reference expression.
    pub fn col(column: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::unqualified(column))
    }

    /// Creates a literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Creates a positional parameter.
    pub fn param(index: usize) -> Self {
        Expr::Param(index)
    }

    /// Creates an arrow reference starting from the statement's main table.
    pub fn path(path: impl Into<String>) -> Self {
        Expr::Path {
            table: None,
            path: path.into(),
        }
    }

    /// Creates an arrow reference starting from `table`.
    pub fn path_from(table: impl Into<String>, path: impl Into<String>) -> Self {
        Expr::Path {
            table: Some(table.into()),
            path: path.into(),
        }
    }

    /// Creates an equality expression.
    pub fn eq(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Eq, right)
    }

    /// Creates a not-equal expression.
    pub fn ne(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Ne, right)
    }

    /// Creates a less-than expression.
    pub fn lt(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Lt, right)
    }

    /// Creates a less-than-or-equal expression.
    pub fn le(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Le, right)
    }

    /// Creates a greater-than expression.
    pub fn gt(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Gt, right)
    }

    /// Creates a greater-than-or-equal expression.
    pub fn ge(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Ge, right)
    }

    /// Creates an AND expression.
    pub fn and(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::And, right)
    }

    /// Creates an OR expression.
    pub fn or(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Or, right)
    }

    /// Creates an addition.
    pub fn add(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Add, right)
    }

    /// Creates a subtraction.
    pub fn sub(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Sub, right)
    }

    /// Creates a multiplication.
    pub fn mul(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Mul, right)
    }

    /// Creates a division.
    pub fn div(left: Expr, right: Expr) -> Self {
        binary(left, BinaryOp::Div, right)
    }

    /// Creates a NOT expression.
    pub fn not(expr: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    /// Creates a negation.
    pub fn neg(expr: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::Neg,
            expr: Box::new(expr),
        }
    }

    /// Creates an IS NULL expression.
    pub fn is_null(expr: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::IsNull,
            expr: Box::new(expr),
        }
    }

    /// Creates an IS NOT NULL expression.
    pub fn is_not_null(expr: Expr) -> Self {
        Expr::UnaryOp {
            op: UnaryOp::IsNotNull,
            expr: Box::new(expr),
        }
    }

    /// Creates a scalar function call.
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// Creates a COUNT(*) aggregate.
    pub fn count_star() -> Self {
        aggregate(AggregateFunc::Count, None)
    }

    /// Creates a COUNT(expr) aggregate.
    pub fn count(expr: Expr) -> Self {
        aggregate(AggregateFunc::Count, Some(expr))
    }

    /// Creates a SUM aggregate.
    pub fn sum(expr: Expr) -> Self {
        aggregate(AggregateFunc::Sum, Some(expr))
    }

    /// Creates an AVG aggregate.
    pub fn avg(expr: Expr) -> Self {
        aggregate(AggregateFunc::Avg, Some(expr))
    }

    /// Creates a MIN aggregate.
    pub fn min(expr: Expr) -> Self {
        aggregate(AggregateFunc::Min, Some(expr))
    }

    /// Creates a MAX aggregate.
    pub fn max(expr: Expr) -> Self {
        aggregate(AggregateFunc::Max, Some(expr))
    }

    /// Creates a STDDEV aggregate.
    pub fn stddev(expr: Expr) -> Self {
        aggregate(AggregateFunc::StdDev, Some(expr))
    }

    /// Creates a GEOMEAN aggregate.
    pub fn geomean(expr: Expr) -> Self {
        aggregate(AggregateFunc::GeoMean, Some(expr))
    }

    /// Creates ROW_NUMBER() over `over`.
    pub fn row_number(over: Over) -> Self {
        aggregate(AggregateFunc::RowNumber, None).over(over)
    }

    /// Creates RANK() over `over`.
    pub fn rank(over: Over) -> Self {
        aggregate(AggregateFunc::Rank, None).over(over)
    }

    /// Creates DENSE_RANK() over `over`.
    pub fn dense_rank(over: Over) -> Self {
        aggregate(AggregateFunc::DenseRank, None).over(over)
    }

    /// Marks an aggregate DISTINCT. No effect on other expressions.
    pub fn distinct(mut self) -> Self {
        if let Expr::Aggregate { distinct, .. } = &mut self {
            *distinct = true;
        }
        self
    }

    /// Attaches a window to an aggregate. No effect on other expressions.
    pub fn over(mut self, window: Over) -> Self {
        if let Expr::Aggregate { over, .. } = &mut self {
            *over = Some(window);
        }
        self
    }

    /// Creates a BETWEEN expression.
    pub fn between(expr: Expr, low: Expr, high: Expr) -> Self {
        Expr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    /// Creates a NOT BETWEEN expression.
    pub fn not_between(expr: Expr, low: Expr, high: Expr) -> Self {
        Expr::NotBetween {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
        }
    }

    /// Creates an IN expression.
    pub fn in_list(expr: Expr, values: Vec<Value>) -> Self {
        Expr::In {
            expr: Box::new(expr),
            list: values.into_iter().map(Expr::Literal).collect(),
        }
    }

    /// Creates a NOT IN expression.
    pub fn not_in_list(expr: Expr, values: Vec<Value>) -> Self {
        Expr::NotIn {
            expr: Box::new(expr),
            list: values.into_iter().map(Expr::Literal).collect(),
        }
    }

    /// Creates a LIKE expression.
    pub fn like(expr: Expr, pattern: &str) -> Self {
        Expr::Like {
            expr: Box::new(expr),
            pattern: pattern.into(),
        }
    }

    /// Creates a NOT LIKE expression.
    pub fn not_like(expr: Expr, pattern: &str) -> Self {
        Expr::NotLike {
            expr: Box::new(expr),
            pattern: pattern.into(),
        }
    }

    /// Returns true for an aggregate carrying a window.
    pub fn is_window(&self) -> bool {
        matches!(self, Expr::Aggregate { over: Some(_), .. })
    }

    /// Returns true if any node satisfies `pred`.
    pub fn any(&self, pred: &mut impl FnMut(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        self.for_each_child(&mut |child| {
            if !found {
                found = child.any(pred);
            }
        });
        found
    }

    /// Returns true if the expression contains an aggregate without a window,
    /// including one nested inside a window's arguments or specification.
    pub fn has_plain_aggregate(&self) -> bool {
        self.any(&mut |e| matches!(e, Expr::Aggregate { over: None, .. }))
    }

    /// Returns true if the expression contains a window function.
    pub fn has_window(&self) -> bool {
        self.any(&mut |e| e.is_window())
    }

    /// Returns true if the expression contains an unresolved arrow reference.
    pub fn has_path(&self) -> bool {
        self.any(&mut |e| matches!(e, Expr::Path { .. }))
    }

    fn for_each_child(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Param(_) | Expr::Path { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                f(&**left);
                f(&**right);
            }
            Expr::UnaryOp { expr, .. } | Expr::Like { expr, .. } | Expr::NotLike { expr, .. } => {
                f(&**expr)
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            Expr::Aggregate { expr, over, .. } => {
                if let Some(expr) = expr {
                    f(&**expr);
                }
                if let Some(Over::Spec(spec)) = over {
                    for e in &spec.partition_by {
                        f(e);
                    }
                    for o in &spec.order_by {
                        f(&o.expr);
                    }
                }
            }
            Expr::Between { expr, low, high } | Expr::NotBetween { expr, low, high } => {
                f(&**expr);
                f(&**low);
                f(&**high);
            }
            Expr::In { expr, list } | Expr::NotIn { expr, list } => {
                f(&**expr);
                for e in list {
                    f(e);
                }
            }
        }
    }

    /// Visits every node in pre-order, parents before children. A node the
    /// callback replaces is not descended into again if the replacement is a
    /// leaf.
    pub fn try_visit_mut<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut Expr) -> Result<()>,
    {
        f(&mut *self)?;
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Param(_) | Expr::Path { .. } => Ok(()),
            Expr::BinaryOp { left, right, .. } => {
                left.try_visit_mut(f)?;
                right.try_visit_mut(f)
            }
            Expr::UnaryOp { expr, .. } | Expr::Like { expr, .. } | Expr::NotLike { expr, .. } => {
                expr.try_visit_mut(f)
            }
            Expr::Function { args, .. } => args.iter_mut().try_for_each(|a| a.try_visit_mut(f)),
            Expr::Aggregate { expr, over, .. } => {
                if let Some(expr) = expr {
                    expr.try_visit_mut(f)?;
                }
                if let Some(Over::Spec(spec)) = over {
                    for e in &mut spec.partition_by {
                        e.try_visit_mut(f)?;
                    }
                    for o in &mut spec.order_by {
                        o.expr.try_visit_mut(f)?;
                    }
                }
                Ok(())
            }
            Expr::Between { expr, low, high } | Expr::NotBetween { expr, low, high } => {
                expr.try_visit_mut(f)?;
                low.try_visit_mut(f)?;
                high.try_visit_mut(f)
            }
            Expr::In { expr, list } | Expr::NotIn { expr, list } => {
                expr.try_visit_mut(f)?;
                list.iter_mut().try_for_each(|e| e.try_visit_mut(f))
            }
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: BinaryOp, right: bool) -> fmt::Result {
        match self {
            Expr::BinaryOp { op, .. }
                if op.precedence() < parent.precedence()
                    || (right && op.precedence() == parent.precedence()) =>
            {
                write!(f, "({})", self)
            }
            _ => write!(f, "{}", self),
        }
    }
}

pub(crate) fn join<T: fmt::Display>(items: &[T]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&item.to_string());
    }
    out
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => write!(f, "{}", col),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Param(index) => write!(f, "?{}", index + 1),
            Expr::Path { table: Some(t), path } => write!(f, "{}.{}", t, path),
            Expr::Path { table: None, path } => f.write_str(path),
            Expr::BinaryOp { left, op, right } => {
                left.fmt_operand(f, *op, false)?;
                write!(f, " {} ", op)?;
                right.fmt_operand(f, *op, true)
            }
            Expr::UnaryOp { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT ({})", expr),
                UnaryOp::Neg => write!(f, "-({})", expr),
                UnaryOp::IsNull => write!(f, "{} IS NULL", expr),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", expr),
            },
            Expr::Function { name, args } => write!(f, "{}({})", name, join(args)),
            Expr::Aggregate {
                func,
                expr,
                distinct,
                over,
            } => {
                write!(f, "{}(", func.name())?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                match expr {
                    Some(expr) => write!(f, "{}", expr)?,
                    None if func.is_window_only() => {}
                    None => f.write_str("*")?,
                }
                f.write_str(")")?;
                if let Some(over) = over {
                    write!(f, " {}", over)?;
                }
                Ok(())
            }
            Expr::Between { expr, low, high } => {
                write!(f, "{} BETWEEN {} AND {}", expr, low, high)
            }
            Expr::NotBetween { expr, low, high } => {
                write!(f, "{} NOT BETWEEN {} AND {}", expr, low, high)
            }
            Expr::In { expr, list } => write!(f, "{} IN ({})", expr, join(list)),
            Expr::NotIn { expr, list } => write!(f, "{} NOT IN ({})", expr, join(list)),
            Expr::Like { expr, pattern } => {
                write!(f, "{} LIKE {}", expr, Value::String(pattern.clone()))
            }
            Expr::NotLike { expr, pattern } => {
                write!(f, "{} NOT LIKE {}", expr, Value::String(pattern.clone()))
            }
        }
    }
}
