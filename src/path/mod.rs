use std::collections::BTreeMap;

use serde_json::Value;

/// Reads the value at a dot-delimited `path`.
///
/// Mappings are traversed by key and sequences by decimal index. Returns
/// `None` as soon as a segment is missing or the current value is a scalar;
/// an explicit `null` is returned as `Some(Value::Null)`.
pub fn resolve<'a>(
    root: &'a Value,
    path: &str,
) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, segment| step(node, segment))
}

/// Like [`resolve`], but folds an explicit `null` into "absent".
pub fn resolve_present<'a>(
    root: &'a Value,
    path: &str,
) -> Option<&'a Value> {
    resolve(root, path).filter(|value| !value.is_null())
}

fn step<'a>(
    node: &'a Value,
    segment: &str,
) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => None,
    }
}

/// Flattens a nested value into `dotted.path -> leaf` pairs.
///
/// Leaves are scalars, nulls, and empty containers so that an empty stats
/// record still shows up as a column.
pub fn flatten(root: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_segments(&mut Vec::new(), root, &mut out);
    out
}

fn flatten_segments(
    path: &mut Vec<String>,
    value: &Value,
    out: &mut BTreeMap<String, Value>,
) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                path.push(key.clone());
                flatten_segments(path, child, out);
                path.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                path.push(index.to_string());
                flatten_segments(path, child, out);
                path.pop();
            }
        }
        _ => {
            if !path.is_empty() {
                out.insert(path.join("."), value.clone());
            }
        }
    }
}
