//! Expression evaluation against a row composition.
//!
//! Logic is three-valued: comparisons and arithmetic with a NULL operand
//! yield NULL, and AND/OR follow Kleene semantics. Predicates accept a row
//! only when the result is truthy.

use crate::aggregate;
use crate::ast::{BinaryOp, ColumnRef, Expr, UnaryOp};
use crate::compose::{RowComposition, Slot, PROJECTION_ALIAS};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use skein_core::pattern_match::like;
use skein_core::{Error, Result, Value};

/// What an expression can see while it is evaluated.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    /// The current composition.
    pub row: &'a RowComposition,
    /// Members of the current group; required by plain aggregates.
    pub group: Option<&'a [RowComposition]>,
    /// Positional parameters.
    pub params: &'a [Value],
    /// Resolve unqualified names against the `$` slot before the sources,
    /// so field aliases win (ORDER BY, HAVING, GROUP BY).
    pub projection_first: bool,
}

impl<'a> Scope<'a> {
    /// Creates a row scope.
    pub fn new(row: &'a RowComposition, params: &'a [Value]) -> Self {
        Self {
            row,
            group: None,
            params,
            projection_first: false,
        }
    }

    /// Makes `members` available to aggregates.
    pub fn with_group(mut self, members: &'a [RowComposition]) -> Self {
        self.group = Some(members);
        self
    }

    /// Resolves field aliases before source columns.
    pub fn projection_first(mut self) -> Self {
        self.projection_first = true;
        self
    }
}

/// Evaluates `expr` in `scope`.
pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
    match expr {
        Expr::Column(col) => column(col, scope),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Param(index) => scope.params.get(*index).cloned().ok_or_else(|| {
            Error::invalid_operation(format!("parameter ?{} is not bound", index + 1))
        }),
        Expr::Path { .. } => Err(Error::invalid_operation(format!(
            "path {} was not resolved to a join",
            expr
        ))),
        Expr::BinaryOp { left, op, right } => binary(left, *op, right, scope),
        Expr::UnaryOp { op, expr } => unary(*op, evaluate(expr, scope)?),
        Expr::Function { name, args } => {
            let args = args
                .iter()
                .map(|a| evaluate(a, scope))
                .collect::<Result<Vec<_>>>()?;
            function(name, args)
        }
        Expr::Aggregate {
            func,
            expr: arg,
            distinct,
            over,
        } => {
            if over.is_some() {
                return Err(Error::invalid_operation(format!(
                    "window function {} evaluated outside of its window",
                    expr
                )));
            }
            let members = scope.group.ok_or_else(|| {
                Error::invalid_operation(format!("aggregate {} used outside of a group", expr))
            })?;
            let mut values = Vec::with_capacity(members.len());
            for member in members {
                let value = match arg {
                    Some(arg) => {
                        let member_scope = Scope {
                            row: member,
                            group: None,
                            params: scope.params,
                            projection_first: scope.projection_first,
                        };
                        evaluate(arg, &member_scope)?
                    }
                    None => Value::Boolean(true),
                };
                values.push(value);
            }
            aggregate::compute(*func, *distinct, values)
        }
        Expr::Between { expr, low, high } => between(expr, low, high, scope),
        Expr::NotBetween { expr, low, high } => {
            Ok(negate(truth(&between(expr, low, high, scope)?)))
        }
        Expr::In { expr, list } => in_list(expr, list, scope),
        Expr::NotIn { expr, list } => Ok(negate(truth(&in_list(expr, list, scope)?))),
        Expr::Like { expr, pattern } => like_match(expr, pattern, scope),
        Expr::NotLike { expr, pattern } => {
            Ok(negate(truth(&like_match(expr, pattern, scope)?)))
        }
    }
}

/// Evaluates a predicate. NULL rejects.
pub fn evaluate_predicate(expr: &Expr, scope: &Scope<'_>) -> Result<bool> {
    Ok(evaluate(expr, scope)?.is_truthy())
}

fn column(col: &ColumnRef, scope: &Scope<'_>) -> Result<Value> {
    let row = scope.row;
    match col.table.as_deref() {
        Some(PROJECTION_ALIAS) => match row.slot(&col.column) {
            Some(Slot::Value(v)) => Ok(v.clone()),
            Some(Slot::Unset) => Err(Error::invalid_operation(format!(
                "field {} is not computed yet",
                col.column
            ))),
            None => Err(Error::column_not_found(PROJECTION_ALIAS, col.column.as_str())),
        },
        Some(alias) => row.column(alias, &col.column),
        None => {
            if scope.projection_first {
                if let Some(Slot::Value(v)) = row.slot(&col.column) {
                    return Ok(v.clone());
                }
            }
            if let Some(v) = row.find_unqualified(&col.column)? {
                return Ok(v);
            }
            if let Some(Slot::Value(v)) = row.slot(&col.column) {
                return Ok(v.clone());
            }
            let aliases: Vec<&str> = row.aliases().collect();
            Err(Error::column_not_found(aliases.join(", "), col.column.as_str()))
        }
    }
}

fn truth(value: &Value) -> Option<bool> {
    if value.is_null() {
        None
    } else {
        Some(value.is_truthy())
    }
}

fn negate(value: Option<bool>) -> Value {
    match value {
        Some(b) => Value::Boolean(!b),
        None => Value::Null,
    }
}

fn tri(value: Option<bool>) -> Value {
    value.map(Value::Boolean).unwrap_or(Value::Null)
}

fn binary(left: &Expr, op: BinaryOp, right: &Expr, scope: &Scope<'_>) -> Result<Value> {
    match op {
        BinaryOp::And => {
            let l = truth(&evaluate(left, scope)?);
            if l == Some(false) {
                return Ok(Value::Boolean(false));
            }
            let r = truth(&evaluate(right, scope)?);
            Ok(match (l, r) {
                (_, Some(false)) => Value::Boolean(false),
                (Some(true), Some(true)) => Value::Boolean(true),
                _ => Value::Null,
            })
        }
        BinaryOp::Or => {
            let l = truth(&evaluate(left, scope)?);
            if l == Some(true) {
                return Ok(Value::Boolean(true));
            }
            let r = truth(&evaluate(right, scope)?);
            Ok(match (l, r) {
                (_, Some(true)) => Value::Boolean(true),
                (Some(false), Some(false)) => Value::Boolean(false),
                _ => Value::Null,
            })
        }
        _ => {
            let l = evaluate(left, scope)?;
            let r = evaluate(right, scope)?;
            if op.is_comparison() {
                Ok(compare(&l, op, &r))
            } else {
                arithmetic(l, op, r)
            }
        }
    }
}

fn compare(l: &Value, op: BinaryOp, r: &Value) -> Value {
    if l.is_null() || r.is_null() {
        return Value::Null;
    }
    let ord = l.cmp(r);
    Value::Boolean(match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        _ => false,
    })
}

fn arithmetic(l: Value, op: BinaryOp, r: Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let overflow = || Error::invalid_operation(format!("integer overflow in {}", op));
    if let (Value::Int64(a), Value::Int64(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::Add => a.checked_add(b).map(Value::Int64).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Int64).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Int64).ok_or_else(overflow),
            BinaryOp::Div if b == 0 => Err(Error::invalid_operation("division by zero")),
            BinaryOp::Div => Ok(Value::Float64(a as f64 / b as f64)),
            BinaryOp::Mod if b == 0 => Err(Error::invalid_operation("division by zero")),
            BinaryOp::Mod => a.checked_rem(b).map(Value::Int64).ok_or_else(overflow),
            _ => Err(Error::invalid_operation(format!("{} is not arithmetic", op))),
        };
    }
    let a = l
        .to_f64()
        .ok_or_else(|| Error::type_mismatch("numeric", l.clone()))?;
    let b = r
        .to_f64()
        .ok_or_else(|| Error::type_mismatch("numeric", r.clone()))?;
    match op {
        BinaryOp::Add => Ok(Value::Float64(a + b)),
        BinaryOp::Sub => Ok(Value::Float64(a - b)),
        BinaryOp::Mul => Ok(Value::Float64(a * b)),
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => {
            Err(Error::invalid_operation("division by zero"))
        }
        BinaryOp::Div => Ok(Value::Float64(a / b)),
        BinaryOp::Mod => Ok(Value::Float64(a % b)),
        _ => Err(Error::invalid_operation(format!("{} is not arithmetic", op))),
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match op {
        UnaryOp::Not => Ok(negate(truth(&value))),
        UnaryOp::IsNull => Ok(Value::Boolean(value.is_null())),
        UnaryOp::IsNotNull => Ok(Value::Boolean(!value.is_null())),
        UnaryOp::Neg => match value {
            Value::Null => Ok(Value::Null),
            Value::Int64(i) => i
                .checked_neg()
                .map(Value::Int64)
                .ok_or_else(|| Error::invalid_operation("integer overflow in negation")),
            Value::Float64(f) => Ok(Value::Float64(-f)),
            other => Err(Error::type_mismatch("numeric", other)),
        },
    }
}

fn between(expr: &Expr, low: &Expr, high: &Expr, scope: &Scope<'_>) -> Result<Value> {
    let value = evaluate(expr, scope)?;
    let low = evaluate(low, scope)?;
    let high = evaluate(high, scope)?;
    if value.is_null() || low.is_null() || high.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Boolean(value >= low && value <= high))
}

fn in_list(expr: &Expr, list: &[Expr], scope: &Scope<'_>) -> Result<Value> {
    let value = evaluate(expr, scope)?;
    if value.is_null() {
        return Ok(Value::Null);
    }
    let mut saw_null = false;
    for item in list {
        let item = evaluate(item, scope)?;
        if item.is_null() {
            saw_null = true;
        } else if value.cmp(&item) == Ordering::Equal {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(tri(if saw_null { None } else { Some(false) }))
}

fn like_match(expr: &Expr, pattern: &str, scope: &Scope<'_>) -> Result<Value> {
    let value = evaluate(expr, scope)?;
    if value.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Boolean(like(&value.to_text(), pattern)))
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::invalid_operation(format!(
            "{} expects {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn function(name: &str, mut args: Vec<Value>) -> Result<Value> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "UPPER" | "LOWER" => {
            arity(&upper, &args, 1)?;
            Ok(match args.pop().unwrap_or(Value::Null) {
                Value::Null => Value::Null,
                v if upper == "UPPER" => Value::String(v.to_text().to_uppercase()),
                v => Value::String(v.to_text().to_lowercase()),
            })
        }
        "LENGTH" => {
            arity(&upper, &args, 1)?;
            Ok(match args.pop().unwrap_or(Value::Null) {
                Value::Null => Value::Null,
                Value::Bytes(b) => Value::Int64(b.len() as i64),
                v => Value::Int64(v.to_text().chars().count() as i64),
            })
        }
        "ABS" => {
            arity(&upper, &args, 1)?;
            match args.pop().unwrap_or(Value::Null) {
                Value::Null => Ok(Value::Null),
                Value::Int64(i) => i
                    .checked_abs()
                    .map(Value::Int64)
                    .ok_or_else(|| Error::invalid_operation("integer overflow in ABS")),
                Value::Float64(f) => Ok(Value::Float64(libm::fabs(f))),
                other => Err(Error::type_mismatch("numeric", other)),
            }
        }
        "COALESCE" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        "IFNULL" => {
            arity(&upper, &args, 2)?;
            Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null))
        }
        "CONCAT" => {
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            let mut out = String::new();
            for arg in &args {
                out.push_str(&arg.to_text());
            }
            Ok(Value::String(out))
        }
        _ => Err(Error::invalid_operation(format!("unknown function {}", name))),
    }
}
