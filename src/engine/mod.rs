//! In-memory aggregate evaluation.
//!
//! One [`AggregateEvaluation`] walks the document slice exactly once, folds
//! every document into the bucket its group key selects, then shapes the
//! bucket set into an [`AggregateResult`]. Any failure while computing a
//! group key aborts the whole evaluation; there are no partial results.

pub mod bucket;
pub mod group_key;
pub mod shape;

use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::EvalError;
use crate::sort::SortKey;
use crate::spec::{AggregateSpec, GroupClause};

use bucket::{Bucket, BucketMap};

pub type Result<T> = std::result::Result<T, EvalError>;

/// Presentation options for grouped results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalOptions {
    pub sort: Vec<SortKey>,
    /// Leading records to drop.
    pub skip: usize,
    /// Maximum records to keep; zero means no cap.
    pub limit: Option<usize>,
    /// Attach the pre-pagination bucket count (or document count when
    /// ungrouped) to the result.
    pub total: bool,
}

impl EvalOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_by(
        mut self,
        keys: impl IntoIterator<Item = SortKey>,
    ) -> Self {
        self.sort = keys.into_iter().collect();
        self
    }

    pub fn skip(
        mut self,
        skip: usize,
    ) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_total(mut self) -> Self {
        self.total = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AggregateResult {
    Global {
        record: Value,
        total: Option<usize>,
    },
    Grouped {
        records: Vec<Value>,
        total: Option<usize>,
    },
}

impl AggregateResult {
    /// The overall count attached through [`EvalOptions::total`].
    pub fn total(&self) -> Option<usize> {
        match self {
            Self::Global { total, .. } | Self::Grouped { total, .. } => *total,
        }
    }

    /// Result records; a global result has at most one.
    pub fn records(&self) -> &[Value] {
        match self {
            Self::Global { record, .. } => std::slice::from_ref(record),
            Self::Grouped { records, .. } => records,
        }
    }

    /// A single JSON document for output.
    ///
    /// Without an overall total this is the record or the record array. With
    /// one, the payload is wrapped as `{"result": ..., "total": n}` or
    /// `{"results": [...], "total": n}` so the count cannot collide with a
    /// record's own `total` field.
    pub fn to_value(&self) -> Value {
        let (name, payload) = match self {
            Self::Global { record, .. } => ("result", record.clone()),
            Self::Grouped { records, .. } => ("results", Value::Array(records.clone())),
        };
        match self.total() {
            None => payload,
            Some(total) => {
                let mut wrapped = Map::new();
                wrapped.insert(name.to_string(), payload);
                wrapped.insert("total".to_string(), Value::from(total));
                Value::Object(wrapped)
            }
        }
    }
}

/// One aggregate evaluation over a fixed document slice.
#[derive(Clone, Copy, Debug)]
pub struct AggregateEvaluation<'a> {
    documents: &'a [Document],
    spec: &'a AggregateSpec,
    options: &'a EvalOptions,
}

impl<'a> AggregateEvaluation<'a> {
    pub fn new(
        documents: &'a [Document],
        spec: &'a AggregateSpec,
        options: &'a EvalOptions,
    ) -> Self {
        Self {
            documents,
            spec,
            options,
        }
    }

    pub fn evaluate(self) -> Result<AggregateResult> {
        self.spec.validate()?;

        match self.spec.group_by.as_deref() {
            Some(clauses) => self.evaluate_grouped(clauses),
            None => Ok(self.evaluate_global()),
        }
    }

    fn evaluate_grouped(
        self,
        clauses: &[GroupClause],
    ) -> Result<AggregateResult> {
        let mut buckets = BucketMap::new();
        for document in self.documents {
            let key = group_key::group_key(document.data(), clauses)?;
            buckets.entry(key).fold(document.data(), self.spec);
        }
        tracing::debug!(
            documents = self.documents.len(),
            buckets = buckets.len(),
            "accumulated grouped aggregate"
        );

        let (records, bucket_count) =
            shape::shape_grouped(buckets.into_buckets(), self.spec, self.options);
        tracing::debug!(records = records.len(), "shaped grouped aggregate");

        Ok(AggregateResult::Grouped {
            records,
            total: self.options.total.then_some(bucket_count),
        })
    }

    fn evaluate_global(self) -> AggregateResult {
        let mut bucket: Option<Bucket> = None;
        for document in self.documents {
            bucket
                .get_or_insert_with(Bucket::global)
                .fold(document.data(), self.spec);
        }
        tracing::debug!(documents = self.documents.len(), "accumulated global aggregate");

        AggregateResult::Global {
            record: shape::shape_global(bucket, self.spec),
            total: self.options.total.then_some(self.documents.len()),
        }
    }
}

/// Evaluates `spec` over `documents`.
pub fn evaluate(
    documents: &[Document],
    spec: &AggregateSpec,
    options: &EvalOptions,
) -> Result<AggregateResult> {
    AggregateEvaluation::new(documents, spec, options).evaluate()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{AggregateResult, EvalOptions, evaluate};
    use crate::document::Document;
    use crate::error::{EvalError, SpecError, UnsupportedReason};
    use crate::sort::SortKey;
    use crate::spec::{AggregateSpec, GroupClause, Range, Stat};

    fn documents(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|value| Document::try_from(value).expect("fixture must be a mapping"))
            .collect()
    }

    fn ages() -> Vec<Document> {
        documents(
            [5, 2, 8, 4, 3, 1]
                .into_iter()
                .map(|age| json!({"age": age}))
                .collect(),
        )
    }

    #[test]
    fn global_stats_and_total() {
        let spec = AggregateSpec::global()
            .with_stats("age", [Stat::Avg, Stat::Max])
            .with_total();
        let result = evaluate(&ages(), &spec, &EvalOptions::new()).expect("must evaluate");

        assert_eq!(
            result,
            AggregateResult::Global {
                record: json!({"stats": {"age": {"avg": 3.8333333333333335, "max": 8}}, "total": 6}),
                total: None,
            }
        );
    }

    #[test]
    fn global_over_no_documents_is_empty() {
        let spec = AggregateSpec::global().with_stats("age", [Stat::Count]).with_total();
        let result = evaluate(&[], &spec, &EvalOptions::new().with_total()).expect("must evaluate");
        assert_eq!(result.records(), &[json!({})]);
        assert_eq!(result.total(), Some(0));
    }

    #[test]
    fn grouped_totals_are_conserved() {
        let spec = AggregateSpec::grouped(vec![GroupClause::interval("age", 3.0, 0.0)]).with_total();
        let result = evaluate(&ages(), &spec, &EvalOptions::new()).expect("must evaluate");

        let totals: u64 = result
            .records()
            .iter()
            .filter_map(|record| record["total"].as_u64())
            .sum();
        assert_eq!(totals, 6);
        assert_eq!(
            result.records().iter().map(|record| record["key"].clone()).collect::<Vec<_>>(),
            vec![json!([3]), json!([0]), json!([6])]
        );
    }

    #[test]
    fn array_group_field_aborts_without_partial_result() {
        let docs = documents(vec![
            json!({"tags": "solo"}),
            json!({"tags": ["a", "b"]}),
            json!({"tags": "late"}),
        ]);
        let spec = AggregateSpec::grouped(vec![GroupClause::field("tags")]).with_total();

        let err = evaluate(&docs, &spec, &EvalOptions::new()).expect_err("arrays must fail");
        assert_eq!(
            err,
            EvalError::UnsupportedOperation {
                field: "tags".to_string(),
                reason: UnsupportedReason::ArrayField
            }
        );
    }

    #[test]
    fn malformed_spec_fails_before_documents_are_read() {
        let spec = AggregateSpec::grouped(vec![GroupClause::ranges(
            "age",
            vec![Range::new(Some(json!(4)), Some(json!(4)))],
        )]);

        let err = evaluate(&[], &spec, &EvalOptions::new()).expect_err("empty range must fail");
        assert!(matches!(
            err,
            EvalError::MalformedSpec(SpecError::InvertedRange { index: 0, .. })
        ));
    }

    #[test]
    fn overall_total_counts_buckets_before_pagination() {
        let spec = AggregateSpec::grouped(vec![GroupClause::field("age")]);
        let options = EvalOptions::new()
            .sort_by([SortKey::asc("key.0")])
            .skip(2)
            .limit(3)
            .with_total();

        let result = evaluate(&ages(), &spec, &options).expect("must evaluate");
        assert_eq!(result.total(), Some(6));
        assert_eq!(
            result.to_value(),
            json!({"results": [{"key": [3]}, {"key": [4]}, {"key": [5]}], "total": 6})
        );
    }

    #[test]
    fn repeated_evaluations_are_identical() {
        let docs = documents(vec![
            json!({"kind": "b", "age": 1}),
            json!({"kind": "a", "age": 2}),
            json!({"kind": "b", "age": 3}),
            json!({"kind": "c"}),
        ]);
        let spec = AggregateSpec::grouped(vec![GroupClause::field("kind")])
            .with_stats("age", Stat::ALL)
            .with_total();
        let options = EvalOptions::new().sort_by([SortKey::desc("total")]);

        let first = evaluate(&docs, &spec, &options).expect("must evaluate");
        let second = evaluate(&docs, &spec, &options).expect("must evaluate");
        assert_eq!(first, second);
        assert_eq!(
            first.records().iter().map(|record| record["key"][0].clone()).collect::<Vec<_>>(),
            vec![json!("b"), json!("a"), json!("c")]
        );
    }
}
