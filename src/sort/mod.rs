use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::path;
use crate::value::natural_cmp;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub path: String,
    pub direction: SortDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortKey {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses `field` or `-field`, the leading dash meaning descending.
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(path) => Self::desc(path),
            None => Self::asc(spec),
        }
    }

    fn compare(
        &self,
        left: &Value,
        right: &Value,
    ) -> Ordering {
        let ordering = match (path::resolve(left, &self.path), path::resolve(right, &self.path)) {
            (Some(left), Some(right)) => natural_cmp(left, right).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        };

        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self.direction {
            SortDirection::Asc => write!(f, "{}", self.path),
            SortDirection::Desc => write!(f, "-{}", self.path),
        }
    }
}

/// Stably reorders `records` by `keys`, left to right.
///
/// Values only order against values of the same kind. A missing value, a
/// `null`, or a pair of different kinds compares equal. Ties keep their input
/// order. Returns `records` for chaining.
pub fn multi_field_sort<'a>(
    records: &'a mut Vec<Value>,
    keys: &[SortKey],
) -> &'a mut Vec<Value> {
    if keys.is_empty() || records.len() < 2 {
        return records;
    }

    let order = stable_order(records.as_slice(), |left, right| compare_records(left, right, keys));
    let mut slots: Vec<Option<Value>> = std::mem::take(records).into_iter().map(Some).collect();
    records.extend(order.into_iter().filter_map(|index| slots[index].take()));
    records
}

fn compare_records(
    left: &Value,
    right: &Value,
    keys: &[SortKey],
) -> Ordering {
    keys.iter()
        .map(|key| key.compare(left, right))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Bottom-up merge sort over indices.
///
/// The comparator may be non-transitive (incomparable pairs are "equal"), so
/// this never relies on the comparator being a total order; ties always take
/// the left run first.
fn stable_order<T>(
    items: &[T],
    mut compare: impl FnMut(&T, &T) -> Ordering,
) -> Vec<usize> {
    let len = items.len();
    let mut order: Vec<usize> = (0..len).collect();
    let mut merged = Vec::with_capacity(len);
    let mut width = 1;

    while width < len {
        merged.clear();
        for start in (0..len).step_by(width * 2) {
            let mid = (start + width).min(len);
            let end = (start + width * 2).min(len);
            let (mut left, mut right) = (start, mid);

            while left < mid && right < end {
                if compare(&items[order[right]], &items[order[left]]).is_lt() {
                    merged.push(order[right]);
                    right += 1;
                } else {
                    merged.push(order[left]);
                    left += 1;
                }
            }
            merged.extend_from_slice(&order[left..mid]);
            merged.extend_from_slice(&order[right..end]);
        }
        std::mem::swap(&mut order, &mut merged);
        width *= 2;
    }

    order
}
