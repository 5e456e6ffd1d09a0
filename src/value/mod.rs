use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Orders two values the way the relational operators do: numbers
/// numerically, strings by code point, booleans `false < true`.
///
/// Any other pairing (mixed kinds, nulls, mappings, sequences) is
/// incomparable and yields `None`.
pub fn natural_cmp(
    left: &Value,
    right: &Value,
) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => compare_numbers(left, right),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        _ => None,
    }
}

fn compare_numbers(
    left: &Number,
    right: &Number,
) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64()) {
        return Some(left.cmp(&right));
    }

    if let (Some(left), Some(right)) = (left.as_u64(), right.as_u64()) {
        return Some(left.cmp(&right));
    }

    match (left.as_f64(), right.as_f64()) {
        (Some(left), Some(right)) => left.partial_cmp(&right),
        _ => None,
    }
}

pub fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

/// Converts a computed float back into a JSON number, preferring the integer
/// form when the float is integral so `20.0` and `20` stay the same value.
pub fn number_value(number: f64) -> Value {
    if number.is_finite() && number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        return Value::from(number as i64);
    }
    Number::from_f64(number).map_or(Value::Null, Value::Number)
}

/// Serializes a group-key tuple into a canonical string usable as a map key.
///
/// Mapping keys are emitted in sorted order and integral numbers share one
/// spelling regardless of how they were parsed, so structurally equal tuples
/// always produce the same string. Every value is tagged with its kind, which
/// keeps `1` and `"1"` apart.
pub fn canonical_key(values: &[Value]) -> String {
    let mut out = String::new();
    write_sequence(values, &mut out);
    out
}

fn write_canonical(
    value: &Value,
    out: &mut String,
) {
    match value {
        Value::Null => out.push('n'),
        Value::Bool(flag) => {
            out.push_str(if *flag { "b:1" } else { "b:0" });
        }
        Value::Number(number) => {
            out.push_str("d:");
            out.push_str(&canonical_number(number));
        }
        Value::String(_) => {
            out.push_str("s:");
            out.push_str(&value.to_string());
        }
        Value::Array(items) => write_sequence(items, out),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

fn write_sequence(
    items: &[Value],
    out: &mut String,
) {
    out.push('[');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        write_canonical(item, out);
    }
    out.push(']');
}

fn canonical_number(number: &Number) -> String {
    if let Some(integer) = number.as_i64() {
        return integer.to_string();
    }
    if let Some(integer) = number.as_u64() {
        return integer.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER => {
            (float as i64).to_string()
        }
        Some(float) => float.to_string(),
        None => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use serde_json::{Value, json};

    use super::{canonical_key, is_scalar, natural_cmp, number_value};

    #[test]
    fn compares_same_kind_values() {
        assert_eq!(natural_cmp(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(natural_cmp(&json!(2.5), &json!(2)), Some(Ordering::Greater));
        assert_eq!(natural_cmp(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(natural_cmp(&json!(false), &json!(true)), Some(Ordering::Less));
        assert_eq!(natural_cmp(&json!(-1), &json!(u64::MAX)), Some(Ordering::Less));
    }

    #[test]
    fn mixed_kinds_are_incomparable() {
        assert_eq!(natural_cmp(&json!(1), &json!("1")), None);
        assert_eq!(natural_cmp(&Value::Null, &json!(0)), None);
        assert_eq!(natural_cmp(&json!({"a": 1}), &json!({"a": 1})), None);
        assert_eq!(natural_cmp(&json!([1]), &json!([1])), None);
    }

    #[test]
    fn scalars_exclude_null_and_containers() {
        assert!(is_scalar(&json!(0)));
        assert!(is_scalar(&json!("")));
        assert!(is_scalar(&json!(false)));
        assert!(!is_scalar(&Value::Null));
        assert!(!is_scalar(&json!([])));
        assert!(!is_scalar(&json!({})));
    }

    #[test]
    fn integral_floats_become_integers() {
        assert_eq!(number_value(20.0), json!(20));
        assert_eq!(number_value(-10.0), json!(-10));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn canonical_key_ignores_map_order_and_number_spelling() {
        let left = vec![json!({"b": 1, "a": 2.0}), json!("cat")];
        let right = vec![json!({"a": 2, "b": 1.0}), json!("cat")];
        assert_eq!(canonical_key(&left), canonical_key(&right));
    }

    #[test]
    fn canonical_key_is_type_and_order_sensitive() {
        assert_ne!(canonical_key(&[json!(1)]), canonical_key(&[json!("1")]));
        assert_ne!(canonical_key(&[json!(true)]), canonical_key(&[json!(1)]));
        assert_ne!(canonical_key(&[Value::Null]), canonical_key(&[json!("null")]));
        assert_ne!(
            canonical_key(&[json!("a"), json!("b")]),
            canonical_key(&[json!("b"), json!("a")])
        );
        assert_ne!(canonical_key(&[json!(["a", "b"])]), canonical_key(&[json!("a"), json!("b")]));
    }
}
