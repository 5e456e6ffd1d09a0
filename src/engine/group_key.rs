use serde_json::Value;

use crate::error::{EvalError, UnsupportedReason};
use crate::path;
use crate::spec::{Bucketing, GroupClause};
use crate::value::number_value;

/// Computes one key value per clause, in clause order.
pub fn group_key(
    data: &Value,
    clauses: &[GroupClause],
) -> Result<Vec<Value>, EvalError> {
    clauses
        .iter()
        .map(|clause| clause_key(data, clause))
        .collect()
}

fn clause_key(
    data: &Value,
    clause: &GroupClause,
) -> Result<Value, EvalError> {
    let Some(value) = path::resolve_present(data, &clause.field) else {
        return Ok(Value::Null);
    };
    if value.is_array() {
        return Err(unsupported(clause, UnsupportedReason::ArrayField));
    }

    match &clause.bucketing {
        Bucketing::Value => Ok(value.clone()),
        Bucketing::Ranges(ranges) => Ok(ranges
            .iter()
            .position(|range| range.contains(value))
            .map_or(Value::Null, Value::from)),
        Bucketing::Interval { interval, base } => Ok(interval_key(value, *interval, *base)),
        Bucketing::TimeComponent(component) => Err(unsupported(
            clause,
            UnsupportedReason::TimeComponent(component.clone()),
        )),
    }
}

/// Left-aligns `value` to the interval grid anchored at `base`.
/// Non-numeric values have no place on the grid and key as `null`.
fn interval_key(
    value: &Value,
    interval: f64,
    base: f64,
) -> Value {
    match value.as_f64() {
        Some(number) => number_value(((number - base) / interval).floor() * interval + base),
        None => Value::Null,
    }
}

fn unsupported(
    clause: &GroupClause,
    reason: UnsupportedReason,
) -> EvalError {
    EvalError::UnsupportedOperation {
        field: clause.field.clone(),
        reason,
    }
}
