pub mod cli;
pub mod document;
pub mod engine;
pub mod error;
pub mod input;
pub mod output;
pub mod path;
pub mod sort;
pub mod spec;
pub mod value;

pub use document::Document;
pub use engine::{AggregateEvaluation, AggregateResult, EvalOptions, evaluate};
pub use error::{EvalError, SpecError, UnsupportedReason};
pub use sort::{SortDirection, SortKey, multi_field_sort};
pub use spec::{AggregateSpec, Bucketing, GroupClause, Range, Stat, StatSet};

pub fn run() -> Result<(), error::CliError> {
    cli::run()
}
