//! Aggregate functions over the argument values of one group or window frame.

use crate::ast::AggregateFunc;
use alloc::vec::Vec;
use hashbrown::HashSet;
use libm::{exp, log, sqrt};
use skein_core::{Error, Result, Value};

/// Computes `func` over `values`. NULL inputs are skipped; `distinct` drops
/// repeated inputs first. `COUNT(*)` callers pass one non-NULL placeholder
/// per row.
pub fn compute(func: AggregateFunc, distinct: bool, values: Vec<Value>) -> Result<Value> {
    let mut values: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    if distinct {
        let mut seen = HashSet::with_capacity(values.len());
        values.retain(|v| seen.insert(v.clone()));
    }

    match func {
        AggregateFunc::Count => Ok(Value::Int64(values.len() as i64)),
        AggregateFunc::Sum => sum(&values),
        AggregateFunc::Avg => {
            let numbers = numeric(&values)?;
            if numbers.is_empty() {
                return Ok(Value::Null);
            }
            Ok(Value::Float64(mean(&numbers)))
        }
        AggregateFunc::Min => Ok(values.into_iter().min().unwrap_or(Value::Null)),
        AggregateFunc::Max => Ok(values.into_iter().max().unwrap_or(Value::Null)),
        AggregateFunc::StdDev => {
            let numbers = numeric(&values)?;
            if numbers.is_empty() {
                return Ok(Value::Null);
            }
            let mean = mean(&numbers);
            let variance = numbers
                .iter()
                .map(|v| (v - mean) * (v - mean))
                .sum::<f64>()
                / numbers.len() as f64;
            Ok(Value::Float64(sqrt(variance)))
        }
        AggregateFunc::GeoMean => {
            // Non-positive inputs have no logarithm and are skipped.
            let positives: Vec<f64> = numeric(&values)?.into_iter().filter(|&v| v > 0.0).collect();
            if positives.is_empty() {
                return Ok(Value::Null);
            }
            let log_sum: f64 = positives.iter().map(|v| log(*v)).sum();
            Ok(Value::Float64(exp(log_sum / positives.len() as f64)))
        }
        AggregateFunc::RowNumber | AggregateFunc::Rank | AggregateFunc::DenseRank => {
            Err(Error::invalid_operation(alloc::format!(
                "{}() requires an OVER clause",
                func.name()
            )))
        }
    }
}

/// Integer inputs sum to Int64; any float input widens the result to Float64.
fn sum(values: &[Value]) -> Result<Value> {
    if values.is_empty() {
        return Ok(Value::Null);
    }
    if values.iter().all(|v| matches!(v, Value::Int64(_))) {
        let mut total: i64 = 0;
        for v in values {
            if let Value::Int64(i) = v {
                total = total
                    .checked_add(*i)
                    .ok_or_else(|| Error::invalid_operation("integer overflow in SUM"))?;
            }
        }
        return Ok(Value::Int64(total));
    }
    Ok(Value::Float64(numeric(values)?.iter().sum()))
}

fn numeric(values: &[Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.to_f64()
                .ok_or_else(|| Error::type_mismatch("numeric", v.clone()))
        })
        .collect()
}

fn mean(numbers: &[f64]) -> f64 {
    numbers.iter().sum::<f64>() / numbers.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int64(*v)).collect()
    }

    #[test]
    fn test_count_skips_nulls() {
        let values = vec![Value::Int64(1), Value::Null, Value::Int64(1)];
        assert_eq!(compute(AggregateFunc::Count, false, values.clone()).unwrap(), Value::Int64(2));
        assert_eq!(compute(AggregateFunc::Count, true, values).unwrap(), Value::Int64(1));
    }

    #[test]
    fn test_sum() {
        assert_eq!(compute(AggregateFunc::Sum, false, ints(&[1, 2, 3])).unwrap(), Value::Int64(6));
        let mixed = vec![Value::Int64(1), Value::Float64(0.5)];
        assert_eq!(compute(AggregateFunc::Sum, false, mixed).unwrap(), Value::Float64(1.5));
        assert_eq!(compute(AggregateFunc::Sum, false, vec![]).unwrap(), Value::Null);
        assert_eq!(
            compute(AggregateFunc::Sum, true, ints(&[2, 2, 3])).unwrap(),
            Value::Int64(5)
        );
    }

    #[test]
    fn test_sum_overflow() {
        let err = compute(AggregateFunc::Sum, false, ints(&[i64::MAX, 1])).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[test]
    fn test_sum_rejects_text() {
        let err = compute(AggregateFunc::Sum, false, vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_avg_min_max() {
        assert_eq!(compute(AggregateFunc::Avg, false, ints(&[1, 2, 3, 4])).unwrap(), Value::Float64(2.5));
        assert_eq!(compute(AggregateFunc::Min, false, ints(&[3, 1, 2])).unwrap(), Value::Int64(1));
        assert_eq!(
            compute(AggregateFunc::Max, false, vec![Value::from("a"), Value::from("c"), Value::Null])
                .unwrap(),
            Value::from("c")
        );
        assert_eq!(compute(AggregateFunc::Max, false, vec![Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn test_stddev() {
        // population stddev of [2, 4, 4, 4, 5, 5, 7, 9] = 2
        let values = ints(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(compute(AggregateFunc::StdDev, false, values).unwrap(), Value::Float64(2.0));
        assert_eq!(compute(AggregateFunc::StdDev, false, vec![]).unwrap(), Value::Null);
    }

    #[test]
    fn test_geomean() {
        match compute(AggregateFunc::GeoMean, false, ints(&[2, 8, 0, -1])).unwrap() {
            Value::Float64(v) => assert!((v - 4.0).abs() < 1e-9),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(compute(AggregateFunc::GeoMean, false, ints(&[0, -3])).unwrap(), Value::Null);
    }

    #[test]
    fn test_window_only_functions_fail() {
        assert!(compute(AggregateFunc::Rank, false, vec![]).is_err());
    }
}
