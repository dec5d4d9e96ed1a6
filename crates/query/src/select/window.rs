//! Window function evaluation.
//!
//! Every distinct window is partitioned and sorted once. Fields sharing a
//! window read from the same frame, and identical window calls are computed
//! once per statement.

use super::order::compare_keys;
use super::Output;
use crate::aggregate;
use crate::ast::{AggregateFunc, Expr, Over, SortOrder, WindowSpec};
use crate::eval::evaluate;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use hashbrown::HashMap;
use skein_core::{Error, Result, Value};
use tracing::trace;

/// Output rows of one window, split into ordered partitions.
struct WindowFrame {
    /// Row indexes per partition, partitions in first-seen order.
    partitions: Vec<Vec<usize>>,
    /// ORDER BY key of each row, indexed like the output rows.
    order_keys: Vec<Vec<Value>>,
    orders: Vec<SortOrder>,
}

impl WindowFrame {
    fn build(spec: &WindowSpec, outputs: &[Output], params: &[Value]) -> Result<Self> {
        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut partitions: Vec<Vec<usize>> = Vec::new();
        let mut order_keys = Vec::with_capacity(outputs.len());

        for (i, output) in outputs.iter().enumerate() {
            let scope = output.scope(params).projection_first();
            let partition_key = spec
                .partition_by
                .iter()
                .map(|e| evaluate(e, &scope))
                .collect::<Result<Vec<_>>>()?;
            let order_key = spec
                .order_by
                .iter()
                .map(|o| evaluate(&o.expr, &scope))
                .collect::<Result<Vec<_>>>()?;
            order_keys.push(order_key);

            match index.get(&partition_key) {
                Some(&p) => partitions[p].push(i),
                None => {
                    index.insert(partition_key, partitions.len());
                    partitions.push(vec![i]);
                }
            }
        }

        let orders: Vec<SortOrder> = spec.order_by.iter().map(|o| o.order).collect();
        for partition in &mut partitions {
            partition.sort_by(|a, b| compare_keys(&order_keys[*a], &order_keys[*b], &orders));
        }

        Ok(Self {
            partitions,
            order_keys,
            orders,
        })
    }

    fn is_ordered(&self) -> bool {
        !self.orders.is_empty()
    }

    fn peers(&self, a: usize, b: usize) -> bool {
        compare_keys(&self.order_keys[a], &self.order_keys[b], &self.orders) == Ordering::Equal
    }

    /// Computes `func` for every row. `args` holds the argument value of
    /// each row.
    fn compute(
        &self,
        func: AggregateFunc,
        distinct: bool,
        args: &[Value],
        len: usize,
    ) -> Result<Vec<Value>> {
        let mut out = vec![Value::Null; len];
        for partition in &self.partitions {
            match func {
                AggregateFunc::RowNumber => {
                    for (n, &row) in partition.iter().enumerate() {
                        out[row] = Value::Int64(n as i64 + 1);
                    }
                }
                AggregateFunc::Rank | AggregateFunc::DenseRank => {
                    let mut rank = 0i64;
                    let mut dense = 0i64;
                    for (n, &row) in partition.iter().enumerate() {
                        if n == 0 || !self.peers(partition[n - 1], row) {
                            rank = n as i64 + 1;
                            dense += 1;
                        }
                        out[row] = Value::Int64(if func == AggregateFunc::Rank {
                            rank
                        } else {
                            dense
                        });
                    }
                }
                _ if !self.is_ordered() => {
                    let values = partition.iter().map(|&r| args[r].clone()).collect();
                    let result = aggregate::compute(func, distinct, values)?;
                    for &row in partition {
                        out[row] = result.clone();
                    }
                }
                _ => {
                    // Frame runs from the partition start through the last peer.
                    let mut start = 0;
                    while start < partition.len() {
                        let mut end = start + 1;
                        while end < partition.len() && self.peers(partition[start], partition[end]) {
                            end += 1;
                        }
                        let values = partition[..end].iter().map(|&r| args[r].clone()).collect();
                        let result = aggregate::compute(func, distinct, values)?;
                        for &row in &partition[start..end] {
                            out[row] = result.clone();
                        }
                        start = end;
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Evaluates window fields over the output rows of a statement.
pub(crate) struct WindowEvaluator<'s> {
    windows: &'s [(String, WindowSpec)],
    params: &'s [Value],
    frames: HashMap<String, WindowFrame>,
    results: HashMap<String, Vec<Value>>,
}

impl<'s> WindowEvaluator<'s> {
    pub fn new(windows: &'s [(String, WindowSpec)], params: &'s [Value]) -> Self {
        Self {
            windows,
            params,
            frames: HashMap::new(),
            results: HashMap::new(),
        }
    }

    /// Resolves an OVER clause against the WINDOW clause into a spec without
    /// a base.
    pub fn resolve(&self, over: &Over) -> Result<WindowSpec> {
        match over {
            Over::Named(name) => self.resolve_named(name, 0),
            Over::Spec(spec) => self.extend(spec, 0),
        }
    }

    fn resolve_named(&self, name: &str, depth: usize) -> Result<WindowSpec> {
        if depth > self.windows.len() {
            return Err(Error::validation(format!(
                "window {} is defined in terms of itself",
                name
            )));
        }
        let spec = self
            .windows
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
            .ok_or_else(|| Error::validation(format!("window {} is not defined", name)))?;
        self.extend(spec, depth + 1)
    }

    fn extend(&self, spec: &WindowSpec, depth: usize) -> Result<WindowSpec> {
        let Some(base) = &spec.base else {
            return Ok(spec.clone());
        };
        let mut resolved = self.resolve_named(base, depth)?;
        resolved
            .partition_by
            .extend(spec.partition_by.iter().cloned());
        if !spec.order_by.is_empty() {
            resolved.order_by = spec.order_by.clone();
        }
        Ok(resolved)
    }

    /// Evaluates `expr` for every output row, returning one value per row.
    pub fn evaluate_field(&mut self, expr: &Expr, outputs: &[Output]) -> Result<Vec<Value>> {
        let mut calls = Vec::new();
        expr.any(&mut |e| {
            if e.is_window() {
                calls.push(e.clone());
            }
            false
        });

        for call in &calls {
            let key = call.to_string();
            if !self.results.contains_key(&key) {
                let values = self.compute_call(call, outputs)?;
                self.results.insert(key, values);
            }
        }

        let mut values = Vec::with_capacity(outputs.len());
        for (row, output) in outputs.iter().enumerate() {
            let mut substituted = expr.clone();
            substituted.try_visit_mut(&mut |node| {
                if node.is_window() {
                    let value = self
                        .results
                        .get(&node.to_string())
                        .and_then(|v| v.get(row))
                        .cloned()
                        .ok_or_else(|| Error::invalid_operation("window result missing"))?;
                    *node = Expr::Literal(value);
                }
                Ok(())
            })?;
            values.push(evaluate(&substituted, &output.scope(self.params))?);
        }
        Ok(values)
    }

    fn compute_call(&mut self, call: &Expr, outputs: &[Output]) -> Result<Vec<Value>> {
        let Expr::Aggregate {
            func,
            expr: arg,
            distinct,
            over: Some(over),
        } = call
        else {
            return Err(Error::invalid_operation("not a window function"));
        };
        if arg.as_ref().is_some_and(|a| a.has_window()) {
            return Err(Error::validation(format!(
                "window functions cannot be nested: {}",
                call
            )));
        }

        let spec = self.resolve(over)?;
        if spec
            .partition_by
            .iter()
            .chain(spec.order_by.iter().map(|o| &o.expr))
            .any(|e| e.has_window())
        {
            return Err(Error::validation(format!(
                "window specification cannot contain window functions: {}",
                spec
            )));
        }
        let signature = spec.to_string();
        if !self.frames.contains_key(&signature) {
            trace!(window = %signature, rows = outputs.len(), "evaluating window");
            let frame = WindowFrame::build(&spec, outputs, self.params)?;
            self.frames.insert(signature.clone(), frame);
        }

        let args = outputs
            .iter()
            .map(|output| match arg {
                Some(a) => evaluate(a, &output.scope(self.params)),
                None => Ok(Value::Boolean(true)),
            })
            .collect::<Result<Vec<_>>>()?;

        let frame = self
            .frames
            .get(&signature)
            .ok_or_else(|| Error::invalid_operation("window frame missing"))?;
        frame.compute(*func, *distinct, &args, outputs.len())
    }
}
