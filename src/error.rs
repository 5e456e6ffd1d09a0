use std::path::PathBuf;

use thiserror::Error;

/// A problem with the aggregate spec itself, found before any document is read.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecError {
    #[error("invalid aggregate syntax: {0}")]
    Syntax(String),
    #[error("unknown statistic '{name}' for field '{field}'")]
    UnknownStat { field: String, name: String },
    #[error("stats entry has an empty field path")]
    EmptyStatField,
    #[error("groupBy has no clauses")]
    EmptyGroupBy,
    #[error("groupBy clause {index} has an empty field path")]
    EmptyGroupField { index: usize },
    #[error("groupBy on '{field}' combines {modes}; use at most one bucketing mode")]
    ConflictingBucketing { field: String, modes: String },
    #[error("groupBy on '{field}' sets a base without an interval")]
    BaseWithoutInterval { field: String },
    #[error("groupBy on '{field}' declares an empty range list")]
    EmptyRanges { field: String },
    #[error("range {index} on '{field}' has a bound that is not a number, string or boolean")]
    NonScalarBound { field: String, index: usize },
    #[error("range {index} on '{field}' has bounds of different kinds")]
    IncomparableBounds { field: String, index: usize },
    #[error("range {index} on '{field}' has start >= end")]
    InvertedRange { field: String, index: usize },
    #[error("interval on '{field}' must be a positive finite number, got {interval}")]
    InvalidInterval { field: String, interval: f64 },
    #[error("base on '{field}' must be a finite number, got {base}")]
    InvalidBase { field: String, base: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedReason {
    #[error("aggregates on array fields are not supported")]
    ArrayField,
    #[error("time component aggregates ('{0}') are not supported")]
    TimeComponent(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unsupported operation on '{field}': {reason}")]
    UnsupportedOperation {
        field: String,
        reason: UnsupportedReason,
    },
    #[error("malformed aggregate spec: {0}")]
    MalformedSpec(#[from] SpecError),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse json in '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse json line {line} in '{}': {source}", .path.display())]
    JsonLine {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to parse yaml in '{}': {source}", .path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("'{}' must contain a sequence of documents", .path.display())]
    NotASequence { path: PathBuf },
    #[error("document {index} in '{}' is not a mapping", .path.display())]
    NotAMapping { path: PathBuf, index: usize },
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to serialize json output: {0}")]
    JsonSerialize(#[from] serde_json::Error),
    #[error("failed to serialize yaml output: {0}")]
    YamlSerialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid args: {0}\n\nTip: run `docagg --help` to see usage and examples.")]
    InvalidArgs(String),
    #[error(
        "input error: {0}\n\nTip: documents are a JSON array, JSON lines (.jsonl) or a YAML sequence of mappings."
    )]
    Input(#[from] InputError),
    #[error("spec error: {0}\n\n{tip}", tip = spec_tip(.0))]
    Spec(#[from] SpecError),
    #[error("evaluation error: {0}\n\n{tip}", tip = eval_tip(.0))]
    Eval(#[from] EvalError),
    #[error("output error: {0}\n\nTip: supported formats are `table`, `json`, `yaml`.")]
    Output(#[from] OutputError),
}

fn spec_tip(error: &SpecError) -> &'static str {
    match error {
        SpecError::UnknownStat { .. } => "Tip: statistics are `count`, `sum`, `avg`, `min`, `max`.",
        SpecError::Syntax(_) => {
            "Tip: spec format is `{groupBy, stats, total}`.\nExample: `{\"groupBy\": \"animalType\", \"stats\": {\"age\": [\"avg\"]}, \"total\": true}`"
        }
        _ => "Tip: ranges are half-open `[start, end)` and intervals must be positive.",
    }
}

fn eval_tip(error: &EvalError) -> &'static str {
    match error {
        EvalError::UnsupportedOperation {
            reason: UnsupportedReason::ArrayField,
            ..
        } => "Tip: group by a scalar field, or by an element path such as `tags.0`.",
        EvalError::UnsupportedOperation {
            reason: UnsupportedReason::TimeComponent(_),
            ..
        } => "Tip: bucket timestamps with `interval` instead of `timeComponent`.",
        EvalError::MalformedSpec(error) => spec_tip(error),
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, EvalError, SpecError, UnsupportedReason};

    #[test]
    fn unsupported_array_error_has_grouping_tip() {
        let err = CliError::Eval(EvalError::UnsupportedOperation {
            field: "tags".to_string(),
            reason: UnsupportedReason::ArrayField,
        });
        let rendered = err.to_string();
        assert!(rendered.contains("unsupported operation on 'tags'"));
        assert!(rendered.contains("array fields"));
        assert!(rendered.contains("tags.0"));
    }

    #[test]
    fn unknown_stat_error_lists_known_stats() {
        let err = CliError::from(SpecError::UnknownStat {
            field: "age".to_string(),
            name: "median".to_string(),
        });
        let rendered = err.to_string();
        assert!(rendered.contains("unknown statistic 'median' for field 'age'"));
        assert!(rendered.contains("`count`, `sum`, `avg`, `min`, `max`"));
    }

    #[test]
    fn malformed_spec_converts_into_eval_error() {
        let err = EvalError::from(SpecError::EmptyRanges {
            field: "age".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "malformed aggregate spec: groupBy on 'age' declares an empty range list"
        );
    }
}
