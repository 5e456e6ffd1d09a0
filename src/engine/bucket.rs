use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Number, Value};

use crate::path;
use crate::spec::AggregateSpec;
use crate::value::{canonical_key, is_scalar, natural_cmp, number_value};

/// Running sum that stays an exact integer until a float or an overflow
/// forces it to widen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sum {
    Int(i64),
    Float(f64),
}

impl Sum {
    fn add(
        self,
        number: &Number,
    ) -> Self {
        if let (Self::Int(sum), Some(addend)) = (self, number.as_i64()) {
            if let Some(sum) = sum.checked_add(addend) {
                return Self::Int(sum);
            }
        }
        Self::Float(self.as_f64() + number.as_f64().unwrap_or_default())
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(sum) => sum as f64,
            Self::Float(sum) => sum,
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            Self::Int(sum) => Value::from(sum),
            Self::Float(sum) => number_value(sum),
        }
    }
}

/// Statistics for one field within one bucket.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsRecord {
    /// Non-null observations, numeric or not.
    pub count: u64,
    /// Starts at zero on the first non-null observation; only numbers add to it.
    pub sum: Option<Sum>,
    /// `sum / count` as of the last numeric observation.
    pub avg: Option<f64>,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

impl StatsRecord {
    pub fn observe(
        &mut self,
        value: &Value,
    ) {
        self.count += 1;
        let sum = self.sum.get_or_insert(Sum::Int(0));

        if let Value::Number(number) = value {
            *sum = sum.add(number);
            self.avg = Some(sum.as_f64() / self.count as f64);
        }

        if is_scalar(value) {
            if self
                .min
                .as_ref()
                .is_none_or(|min| natural_cmp(value, min).is_some_and(|ordering| ordering.is_lt()))
            {
                self.min = Some(value.clone());
            }
            if self
                .max
                .as_ref()
                .is_none_or(|max| natural_cmp(value, max).is_some_and(|ordering| ordering.is_gt()))
            {
                self.max = Some(value.clone());
            }
        }
    }

    /// Every statistic observed so far, keyed by its result name.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        if self.count > 0 {
            out.insert("count".to_string(), Value::from(self.count));
        }
        if let Some(sum) = self.sum {
            out.insert("sum".to_string(), sum.to_value());
        }
        if let Some(avg) = self.avg {
            out.insert("avg".to_string(), number_value(avg));
        }
        if let Some(min) = &self.min {
            out.insert("min".to_string(), min.clone());
        }
        if let Some(max) = &self.max {
            out.insert("max".to_string(), max.clone());
        }
        Value::Object(out)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bucket {
    /// Group-key tuple; `None` for the global bucket.
    pub key: Option<Vec<Value>>,
    pub stats: BTreeMap<String, StatsRecord>,
    pub total: u64,
}

impl Bucket {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn keyed(key: Vec<Value>) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Folds one document into the bucket. Fields missing from the document
    /// or set to `null` leave their stats untouched.
    pub fn fold(
        &mut self,
        data: &Value,
        spec: &AggregateSpec,
    ) {
        for field in spec.stats.keys() {
            let record = self.stats.entry(field.clone()).or_default();
            if let Some(value) = path::resolve_present(data, field) {
                record.observe(value);
            }
        }

        if spec.total {
            self.total += 1;
        }
    }

    /// Renders the bucket as an unpruned result record: `key` when grouped,
    /// `stats` when any field stats are requested, `total` when a total is requested.
    pub fn to_record(
        &self,
        spec: &AggregateSpec,
    ) -> Value {
        let mut record = Map::new();
        if let Some(key) = &self.key {
            record.insert("key".to_string(), Value::Array(key.clone()));
        }
        if !spec.stats.is_empty() {
            let stats = self
                .stats
                .iter()
                .map(|(field, stats)| (field.clone(), stats.to_value()))
                .collect();
            record.insert("stats".to_string(), Value::Object(stats));
        }
        if spec.total {
            record.insert("total".to_string(), Value::from(self.total));
        }
        Value::Object(record)
    }
}

/// Buckets indexed by the canonical form of their key, in first-seen order.
#[derive(Debug, Default)]
pub struct BucketMap {
    index: HashMap<String, usize>,
    buckets: Vec<Bucket>,
}

impl BucketMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bucket for `key`, creating it on first touch.
    pub fn entry(
        &mut self,
        key: Vec<Value>,
    ) -> &mut Bucket {
        let hash = canonical_key(&key);
        let position = match self.index.get(&hash) {
            Some(position) => *position,
            None => {
                tracing::trace!(key = %hash, "creating bucket");
                self.buckets.push(Bucket::keyed(key));
                self.index.insert(hash, self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[position]
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn into_buckets(self) -> Vec<Bucket> {
        self.buckets
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{Bucket, BucketMap, StatsRecord, Sum};
    use crate::spec::{AggregateSpec, Stat};

    fn age_spec() -> AggregateSpec {
        AggregateSpec::global()
            .with_stats("age", Stat::ALL)
            .with_total()
    }

    #[test]
    fn folds_numeric_stats_and_totals() {
        let spec = age_spec();
        let mut bucket = Bucket::global();
        for age in [5, 2, 8, 4, 3, 1] {
            bucket.fold(&json!({"age": age}), &spec);
        }

        let stats = &bucket.stats["age"];
        assert_eq!(stats.count, 6);
        assert_eq!(stats.sum, Some(Sum::Int(23)));
        assert_eq!(stats.avg, Some(23.0 / 6.0));
        assert_eq!(stats.min, Some(json!(1)));
        assert_eq!(stats.max, Some(json!(8)));
        assert_eq!(bucket.total, 6);
    }

    #[test]
    fn null_and_absent_values_are_skipped_but_still_totalled() {
        let spec = age_spec();
        let mut bucket = Bucket::global();
        bucket.fold(&json!({"age": null}), &spec);
        bucket.fold(&json!({"name": "Zippy"}), &spec);
        bucket.fold(&json!({"age": 0}), &spec);

        let stats = &bucket.stats["age"];
        assert_eq!(stats.count, 1);
        assert_eq!(stats.sum, Some(Sum::Int(0)));
        assert_eq!(stats.min, Some(json!(0)));
        assert_eq!(bucket.total, 3);
        assert!(stats.count <= bucket.total);
    }

    #[test]
    fn mixed_types_keep_avg_at_last_numeric_update() {
        let mut stats = StatsRecord::default();
        stats.observe(&json!(4));
        stats.observe(&json!(2));
        assert_eq!(stats.avg, Some(3.0));

        stats.observe(&json!("seven"));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, Some(Sum::Int(6)));
        assert_eq!(stats.avg, Some(3.0));

        stats.observe(&json!(3));
        assert_eq!(stats.avg, Some(9.0 / 4.0));
    }

    #[test]
    fn min_max_ignore_incomparable_and_non_scalar_values() {
        let mut stats = StatsRecord::default();
        stats.observe(&json!("b"));
        stats.observe(&json!(10));
        stats.observe(&json!("a"));
        stats.observe(&json!({"nested": true}));
        stats.observe(&json!("c"));

        assert_eq!(stats.count, 5);
        assert_eq!(stats.min, Some(json!("a")));
        assert_eq!(stats.max, Some(json!("c")));
        assert_eq!(stats.sum, Some(Sum::Int(10)));
        assert_eq!(stats.avg, Some(5.0));
    }

    #[test]
    fn non_numeric_only_fields_have_zero_sum_and_no_avg() {
        let mut stats = StatsRecord::default();
        stats.observe(&json!("x"));
        assert_eq!(stats.to_value(), json!({"count": 1, "sum": 0, "min": "x", "max": "x"}));
        assert_eq!(StatsRecord::default().to_value(), json!({}));
    }

    #[test]
    fn sums_widen_on_floats_and_overflow() {
        let mut stats = StatsRecord::default();
        stats.observe(&json!(1));
        stats.observe(&json!(0.5));
        assert_eq!(stats.sum, Some(Sum::Float(1.5)));

        let mut big = StatsRecord::default();
        big.observe(&json!(i64::MAX));
        big.observe(&json!(1));
        assert!(matches!(big.sum, Some(Sum::Float(_))));
    }

    #[test]
    fn records_include_requested_sections_only() {
        let spec = AggregateSpec::global().with_stats("age", [Stat::Count]);
        let mut bucket = Bucket::keyed(vec![json!("cat")]);
        bucket.fold(&json!({"age": 5}), &spec);

        assert_eq!(
            bucket.to_record(&spec),
            json!({"key": ["cat"], "stats": {"age": {"count": 1, "sum": 5, "avg": 5, "min": 5, "max": 5}}})
        );
        assert_eq!(Bucket::global().to_record(&AggregateSpec::global()), json!({}));
    }

    #[test]
    fn bucket_map_dedupes_structurally_equal_keys_in_first_seen_order() {
        let mut buckets = BucketMap::new();
        buckets.entry(vec![json!("dog")]).total += 1;
        buckets.entry(vec![json!("cat")]).total += 1;
        buckets.entry(vec![json!("dog")]).total += 1;
        buckets.entry(vec![json!(1.0)]).total += 1;
        buckets.entry(vec![json!(1)]).total += 1;
        buckets.entry(vec![json!("1")]).total += 1;
        buckets.entry(vec![Value::Null]).total += 1;

        assert_eq!(buckets.len(), 5);
        let totals: Vec<(Value, u64)> = buckets
            .into_buckets()
            .into_iter()
            .map(|bucket| (Value::Array(bucket.key.unwrap_or_default()), bucket.total))
            .collect();
        assert_eq!(
            totals,
            vec![
                (json!(["dog"]), 2),
                (json!(["cat"]), 1),
                (json!([1.0]), 2),
                (json!(["1"]), 1),
                (json!([null]), 1)
            ]
        );
    }
}
