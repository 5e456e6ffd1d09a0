//! Normalized aggregate specs and the parser for their user-facing syntax.
//!
//! The evaluator only consumes [`AggregateSpec`]. The raw syntax accepted
//! here mirrors what callers write by hand:
//!
//! ```text
//! groupBy:  "field" | {field, ranges?, interval?, base?, timeComponent?} | [ ... ]
//! stats:    { field: {count: true, avg: true} | ["count", "avg"] | "count" }
//! total:    bool
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SpecError;
use crate::value::{is_scalar, natural_cmp};

pub type Result<T> = std::result::Result<T, SpecError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stat {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Stat {
    pub const ALL: [Stat; 5] = [Stat::Count, Stat::Sum, Stat::Avg, Stat::Min, Stat::Max];

    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Looks up a statistic by the name used in result records.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stat| stat.name() == name)
    }
}

impl fmt::Display for Stat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type StatSet = BTreeSet<Stat>;

/// Half-open range `[start, end)`; a missing bound is unbounded on that side.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Range {
    #[serde(default)]
    pub start: Option<Value>,
    #[serde(default)]
    pub end: Option<Value>,
}

impl Range {
    pub fn new(
        start: Option<Value>,
        end: Option<Value>,
    ) -> Self {
        Self { start, end }
    }

    pub fn contains(
        &self,
        value: &Value,
    ) -> bool {
        let above_start = self.start.as_ref().is_none_or(|start| {
            natural_cmp(value, start).is_some_and(|ordering| ordering.is_ge())
        });
        let below_end = self
            .end
            .as_ref()
            .is_none_or(|end| natural_cmp(value, end).is_some_and(|ordering| ordering.is_lt()));
        above_start && below_end
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Bucketing {
    /// Group on the field value itself.
    Value,
    Ranges(Vec<Range>),
    Interval { interval: f64, base: f64 },
    /// Calendar component bucketing; always rejected during evaluation.
    TimeComponent(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupClause {
    pub field: String,
    pub bucketing: Bucketing,
}

impl GroupClause {
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            bucketing: Bucketing::Value,
        }
    }

    pub fn ranges(
        field: impl Into<String>,
        ranges: Vec<Range>,
    ) -> Self {
        Self {
            field: field.into(),
            bucketing: Bucketing::Ranges(ranges),
        }
    }

    pub fn interval(
        field: impl Into<String>,
        interval: f64,
        base: f64,
    ) -> Self {
        Self {
            field: field.into(),
            bucketing: Bucketing::Interval { interval, base },
        }
    }

    pub fn time_component(
        field: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            bucketing: Bucketing::TimeComponent(component.into()),
        }
    }

    fn validate(
        &self,
        index: usize,
    ) -> Result<()> {
        if self.field.is_empty() {
            return Err(SpecError::EmptyGroupField { index });
        }

        match &self.bucketing {
            Bucketing::Value | Bucketing::TimeComponent(_) => Ok(()),
            Bucketing::Ranges(ranges) => self.validate_ranges(ranges),
            Bucketing::Interval { interval, base } => {
                if !interval.is_finite() || *interval <= 0.0 {
                    return Err(SpecError::InvalidInterval {
                        field: self.field.clone(),
                        interval: *interval,
                    });
                }
                if !base.is_finite() {
                    return Err(SpecError::InvalidBase {
                        field: self.field.clone(),
                        base: *base,
                    });
                }
                Ok(())
            }
        }
    }

    fn validate_ranges(
        &self,
        ranges: &[Range],
    ) -> Result<()> {
        if ranges.is_empty() {
            return Err(SpecError::EmptyRanges {
                field: self.field.clone(),
            });
        }

        for (index, range) in ranges.iter().enumerate() {
            let bounds = [range.start.as_ref(), range.end.as_ref()];
            if bounds.into_iter().flatten().any(|bound| !is_scalar(bound)) {
                return Err(SpecError::NonScalarBound {
                    field: self.field.clone(),
                    index,
                });
            }

            let (Some(start), Some(end)) = (&range.start, &range.end) else {
                continue;
            };
            match natural_cmp(start, end) {
                None => {
                    return Err(SpecError::IncomparableBounds {
                        field: self.field.clone(),
                        index,
                    });
                }
                Some(ordering) if ordering.is_ge() => {
                    return Err(SpecError::InvertedRange {
                        field: self.field.clone(),
                        index,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// The normalized description of one aggregate computation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregateSpec {
    /// `None` means a single global bucket.
    pub group_by: Option<Vec<GroupClause>>,
    pub stats: BTreeMap<String, StatSet>,
    pub total: bool,
}

impl AggregateSpec {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn grouped(clauses: Vec<GroupClause>) -> Self {
        Self {
            group_by: Some(clauses),
            ..Self::default()
        }
    }

    pub fn with_stats(
        mut self,
        field: impl Into<String>,
        stats: impl IntoIterator<Item = Stat>,
    ) -> Self {
        self.stats.entry(field.into()).or_default().extend(stats);
        self
    }

    pub fn with_total(mut self) -> Self {
        self.total = true;
        self
    }

    pub fn is_grouped(&self) -> bool {
        self.group_by.is_some()
    }

    /// Checks internal consistency of every clause and stats entry.
    pub fn validate(&self) -> Result<()> {
        if self.stats.keys().any(String::is_empty) {
            return Err(SpecError::EmptyStatField);
        }

        let Some(clauses) = &self.group_by else {
            return Ok(());
        };
        if clauses.is_empty() {
            return Err(SpecError::EmptyGroupBy);
        }
        clauses
            .iter()
            .enumerate()
            .try_for_each(|(index, clause)| clause.validate(index))
    }

    pub fn from_json_value(value: Value) -> Result<Self> {
        let raw: RawSpec =
            serde_json::from_value(value).map_err(|error| SpecError::Syntax(error.to_string()))?;
        raw.normalize()
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        let raw: RawSpec =
            serde_json::from_str(input).map_err(|error| SpecError::Syntax(error.to_string()))?;
        raw.normalize()
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let raw: RawSpec =
            serde_yaml::from_str(input).map_err(|error| SpecError::Syntax(error.to_string()))?;
        raw.normalize()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSpec {
    #[serde(default)]
    group_by: Option<RawGroupBy>,
    #[serde(default)]
    stats: BTreeMap<String, RawStats>,
    #[serde(default)]
    total: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGroupBy {
    One(RawGroupItem),
    Many(Vec<RawGroupItem>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGroupItem {
    Field(String),
    Clause(RawClause),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawClause {
    field: String,
    #[serde(default)]
    ranges: Option<Vec<Range>>,
    #[serde(default)]
    interval: Option<f64>,
    #[serde(default)]
    base: Option<f64>,
    #[serde(default)]
    time_component: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStats {
    Flags(BTreeMap<String, bool>),
    Names(Vec<String>),
    Name(String),
}

impl RawSpec {
    fn normalize(self) -> Result<AggregateSpec> {
        let group_by = self.group_by.map(|group_by| match group_by {
            RawGroupBy::One(item) => vec![item],
            RawGroupBy::Many(items) => items,
        });
        let group_by = group_by
            .map(|items| {
                items
                    .into_iter()
                    .map(RawGroupItem::normalize)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let mut stats = BTreeMap::new();
        for (field, raw) in self.stats {
            let names: Vec<String> = match raw {
                RawStats::Flags(flags) => flags
                    .into_iter()
                    .filter_map(|(name, enabled)| enabled.then_some(name))
                    .collect(),
                RawStats::Names(names) => names,
                RawStats::Name(name) => vec![name],
            };
            let set = parse_stat_names(&field, names.iter().map(String::as_str))?;
            stats.insert(field, set);
        }

        let spec = AggregateSpec {
            group_by,
            stats,
            total: self.total,
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl RawGroupItem {
    fn normalize(self) -> Result<GroupClause> {
        match self {
            Self::Field(field) => Ok(GroupClause::field(field)),
            Self::Clause(clause) => clause.normalize(),
        }
    }
}

impl RawClause {
    fn normalize(self) -> Result<GroupClause> {
        let mut modes = Vec::new();
        if self.ranges.is_some() {
            modes.push("ranges");
        }
        if self.interval.is_some() {
            modes.push("interval");
        }
        if self.time_component.is_some() {
            modes.push("timeComponent");
        }
        if modes.len() > 1 {
            return Err(SpecError::ConflictingBucketing {
                field: self.field,
                modes: modes.join(" and "),
            });
        }
        if self.base.is_some() && self.interval.is_none() {
            return Err(SpecError::BaseWithoutInterval { field: self.field });
        }

        let bucketing = if let Some(ranges) = self.ranges {
            Bucketing::Ranges(ranges)
        } else if let Some(interval) = self.interval {
            Bucketing::Interval {
                interval,
                base: self.base.unwrap_or(0.0),
            }
        } else if let Some(component) = self.time_component {
            Bucketing::TimeComponent(component)
        } else {
            Bucketing::Value
        };

        Ok(GroupClause {
            field: self.field,
            bucketing,
        })
    }
}

fn parse_stat_names<'a>(
    field: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<StatSet> {
    names
        .into_iter()
        .map(|name| {
            Stat::from_name(name.trim()).ok_or_else(|| SpecError::UnknownStat {
                field: field.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Parses the compact `FIELD=STAT[,STAT...]` form used on the command line.
pub fn parse_stat_arg(input: &str) -> Result<(String, StatSet)> {
    let Some((field, names)) = input.split_once('=') else {
        return Err(SpecError::Syntax(format!(
            "stat '{input}' must look like FIELD=STAT[,STAT...]"
        )));
    };
    let field = field.trim();
    if field.is_empty() {
        return Err(SpecError::EmptyStatField);
    }
    let set = parse_stat_names(field, names.split(',').filter(|name| !name.trim().is_empty()))?;
    Ok((field.to_string(), set))
}

/// Parses the compact group clause form used on the command line.
///
/// `FIELD`, `FIELD:interval=N[:base=N]`, `FIELD:ranges=[START]..[END][,...]`
/// and `FIELD:time=COMPONENT`. Range bounds that parse as JSON scalars are
/// taken as such, anything else is a string.
pub fn parse_group_arg(input: &str) -> Result<GroupClause> {
    let mut parts = input.split(':');
    let field = parts.next().unwrap_or_default().trim();
    let mut raw = RawClause {
        field: field.to_string(),
        ranges: None,
        interval: None,
        base: None,
        time_component: None,
    };

    for option in parts {
        let Some((name, value)) = option.split_once('=') else {
            return Err(SpecError::Syntax(format!(
                "groupBy option '{option}' must look like NAME=VALUE"
            )));
        };
        let value = value.trim();
        match name.trim() {
            "interval" => raw.interval = Some(parse_float(name, value)?),
            "base" => raw.base = Some(parse_float(name, value)?),
            "time" | "timeComponent" => raw.time_component = Some(value.to_string()),
            "ranges" => {
                let ranges = value
                    .split(',')
                    .map(parse_range_arg)
                    .collect::<Result<Vec<_>>>()?;
                raw.ranges = Some(ranges);
            }
            other => {
                return Err(SpecError::Syntax(format!(
                    "unknown groupBy option '{other}' (expected interval, base, ranges or time)"
                )));
            }
        }
    }

    let clause = raw.normalize()?;
    clause.validate(0)?;
    Ok(clause)
}

fn parse_float(
    name: &str,
    value: &str,
) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| SpecError::Syntax(format!("{name} '{value}' is not a number")))
}

fn parse_range_arg(input: &str) -> Result<Range> {
    let Some((start, end)) = input.split_once("..") else {
        return Err(SpecError::Syntax(format!(
            "range '{input}' must look like [START]..[END]"
        )));
    };
    Ok(Range::new(parse_bound(start), parse_bound(end)))
}

fn parse_bound(input: &str) -> Option<Value> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(input) {
        Ok(value) if is_scalar(&value) => Some(value),
        _ => Some(Value::String(input.to_string())),
    }
}
