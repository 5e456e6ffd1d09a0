use serde_json::Value;

use super::EvalOptions;
use super::bucket::Bucket;
use crate::sort::multi_field_sort;
use crate::spec::{AggregateSpec, Stat};

/// Sorts, paginates and prunes grouped bucket records.
///
/// Returns the surviving records together with the bucket count before
/// pagination.
pub fn shape_grouped(
    buckets: Vec<Bucket>,
    spec: &AggregateSpec,
    options: &EvalOptions,
) -> (Vec<Value>, usize) {
    let mut records: Vec<Value> = buckets.iter().map(|bucket| bucket.to_record(spec)).collect();
    let bucket_count = records.len();

    if !options.sort.is_empty() {
        multi_field_sort(&mut records, &options.sort);
    }
    if options.skip > 0 {
        records.drain(..options.skip.min(records.len()));
    }
    if let Some(limit) = options.limit.filter(|limit| *limit > 0) {
        records.truncate(limit);
    }

    for record in &mut records {
        prune_record(record, spec);
    }
    (records, bucket_count)
}

/// Prunes the global bucket, or yields an empty record when nothing was folded.
pub fn shape_global(
    bucket: Option<Bucket>,
    spec: &AggregateSpec,
) -> Value {
    let mut record = match bucket {
        Some(bucket) => bucket.to_record(spec),
        None => Value::Object(Default::default()),
    };
    prune_record(&mut record, spec);
    record
}

/// Keeps only requested stats and `total`; an empty `stats` object is dropped.
pub fn prune_record(
    record: &mut Value,
    spec: &AggregateSpec,
) {
    let Value::Object(record) = record else {
        return;
    };

    if let Some(Value::Object(stats)) = record.get_mut("stats") {
        for (field, field_stats) in stats.iter_mut() {
            let Value::Object(field_stats) = field_stats else {
                continue;
            };
            let requested = spec.stats.get(field);
            field_stats.retain(|name, _| {
                Stat::from_name(name)
                    .is_some_and(|stat| requested.is_some_and(|set| set.contains(&stat)))
            });
        }
    }
    if record
        .get("stats")
        .is_some_and(|stats| stats.as_object().is_none_or(|stats| stats.is_empty()))
    {
        record.remove("stats");
    }
    if !spec.total {
        record.remove("total");
    }
}
