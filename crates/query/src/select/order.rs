//! ORDER BY: stable sort on keys computed once per output row.

use super::Output;
use crate::ast::{OrderBy, SortOrder};
use crate::eval::evaluate;
use alloc::vec::Vec;
use core::cmp::Ordering;
use skein_core::{Result, Value};

/// Compares two key tuples criterion by criterion. NULL sorts first in
/// ascending order.
pub fn compare_keys(a: &[Value], b: &[Value], orders: &[SortOrder]) -> Ordering {
    for (i, order) in orders.iter().enumerate() {
        let cmp = match (a.get(i), b.get(i)) {
            (Some(av), Some(bv)) => av.cmp(bv),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        if cmp != Ordering::Equal {
            return match order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            };
        }
    }
    Ordering::Equal
}

/// Sorts `outputs` by `order_by`. Criteria resolve field aliases first and
/// may use aggregates of the row's group.
pub(crate) fn sort_outputs(
    outputs: Vec<Output>,
    order_by: &[OrderBy],
    params: &[Value],
) -> Result<Vec<Output>> {
    if order_by.is_empty() {
        return Ok(outputs);
    }
    let mut keyed = Vec::with_capacity(outputs.len());
    for output in outputs {
        let scope = output.scope(params).projection_first();
        let key = order_by
            .iter()
            .map(|o| evaluate(&o.expr, &scope))
            .collect::<Result<Vec<_>>>()?;
        keyed.push((key, output));
    }
    let orders: Vec<SortOrder> = order_by.iter().map(|o| o.order).collect();
    keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &orders));
    Ok(keyed.into_iter().map(|(_, output)| output).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_compare_keys() {
        let asc = [SortOrder::Asc];
        let desc = [SortOrder::Desc];
        let one = [Value::Int64(1)];
        let two = [Value::Int64(2)];
        assert_eq!(compare_keys(&one, &two, &asc), Ordering::Less);
        assert_eq!(compare_keys(&one, &two, &desc), Ordering::Greater);
        assert_eq!(compare_keys(&[Value::Null], &one, &asc), Ordering::Less);
    }

    #[test]
    fn test_compare_keys_multiple_criteria() {
        let orders = [SortOrder::Asc, SortOrder::Desc];
        let a = vec![Value::from("x"), Value::Int64(1)];
        let b = vec![Value::from("x"), Value::Int64(2)];
        assert_eq!(compare_keys(&a, &b, &orders), Ordering::Greater);
        assert_eq!(compare_keys(&a, &a, &orders), Ordering::Equal);
    }
}
