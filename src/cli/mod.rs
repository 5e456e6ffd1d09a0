use std::path::PathBuf;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::engine::{self, EvalOptions};
use crate::error::CliError;
use crate::sort::SortKey;
use crate::spec::{self, AggregateSpec};
use crate::{input, output};

#[derive(Clone, Debug, ValueEnum)]
enum OutputArg {
    Table,
    Json,
    Yaml,
}

#[derive(Parser, Debug)]
#[command(name = "docagg")]
#[command(about = "Group documents and compute per-field statistics in memory")]
#[command(version)]
#[command(after_help = "Examples:\n  \
    docagg --docs animals.json --group-by animalType --stat age=avg,max --count\n  \
    docagg --docs animals.yaml --spec aggregate.yaml --sort=-total --limit 3 -o json")]
struct CliArgs {
    #[arg(
        short = 'o',
        long = "output",
        default_value = "table",
        value_enum,
        ignore_case = true
    )]
    output: OutputArg,

    /// Documents file: JSON array, JSON lines (.jsonl) or YAML sequence; `-` for stdin
    #[arg(short = 'd', long = "docs", value_name = "FILE")]
    docs: PathBuf,

    /// Aggregate spec file (JSON or YAML)
    #[arg(long = "spec", value_name = "FILE", conflicts_with_all = ["group_by", "stats", "count"])]
    spec: Option<PathBuf>,

    /// Group clause: FIELD, FIELD:interval=N[:base=N], FIELD:ranges=[A]..[B],...
    #[arg(short = 'g', long = "group-by", value_name = "CLAUSE")]
    group_by: Vec<String>,

    /// Statistics for a field: FIELD=count,sum,avg,min,max
    #[arg(short = 's', long = "stat", value_name = "FIELD=STATS")]
    stats: Vec<String>,

    /// Count documents per bucket
    #[arg(short = 'c', long = "count")]
    count: bool,

    /// Sort results by a record path; prefix with `-` for descending
    #[arg(long = "sort", value_name = "PATH", allow_hyphen_values = true)]
    sort: Vec<String>,

    #[arg(long = "skip", value_name = "N", default_value_t = 0)]
    skip: usize,

    /// Maximum number of results; 0 means no limit
    #[arg(long = "limit", value_name = "N")]
    limit: Option<usize>,

    /// Report the number of buckets (or documents) before skip/limit
    #[arg(short = 't', long = "total")]
    total: bool,
}

pub fn run() -> Result<(), CliError> {
    let Some(args) = parse_cli_args()? else {
        return Ok(());
    };

    let spec = build_spec(&args)?;
    let options = build_options(&args);
    let documents = input::load_documents(&args.docs)?;
    tracing::info!(
        documents = documents.len(),
        grouped = spec.is_grouped(),
        "evaluating aggregate"
    );

    let result = engine::evaluate(&documents, &spec, &options)?;
    let rendered = output::render(&result, map_output_format(args.output))?;
    println!("{rendered}");
    Ok(())
}

fn parse_cli_args() -> Result<Option<CliArgs>, CliError> {
    match CliArgs::try_parse() {
        Ok(args) => Ok(Some(args)),
        Err(error) => {
            if matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                print!("{error}");
                return Ok(None);
            }
            Err(CliError::InvalidArgs(error.to_string()))
        }
    }
}

fn build_spec(args: &CliArgs) -> Result<AggregateSpec, CliError> {
    if let Some(path) = &args.spec {
        return input::load_spec(path);
    }

    let mut aggregate = if args.group_by.is_empty() {
        AggregateSpec::global()
    } else {
        let clauses = args
            .group_by
            .iter()
            .map(|clause| spec::parse_group_arg(clause))
            .collect::<Result<Vec<_>, _>>()?;
        AggregateSpec::grouped(clauses)
    };

    for stat in &args.stats {
        let (field, stats) = spec::parse_stat_arg(stat)?;
        aggregate = aggregate.with_stats(field, stats);
    }
    if args.count {
        aggregate = aggregate.with_total();
    }

    aggregate.validate()?;
    Ok(aggregate)
}

fn build_options(args: &CliArgs) -> EvalOptions {
    EvalOptions {
        sort: args.sort.iter().map(|key| SortKey::parse(key)).collect(),
        skip: args.skip,
        limit: args.limit,
        total: args.total,
    }
}

fn map_output_format(format: OutputArg) -> output::OutputFormat {
    match format {
        OutputArg::Table => output::OutputFormat::Table,
        OutputArg::Json => output::OutputFormat::Json,
        OutputArg::Yaml => output::OutputFormat::Yaml,
    }
}
