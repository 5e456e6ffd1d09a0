use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::engine::AggregateResult;
use crate::error::OutputError;
use crate::path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

pub fn render(
    result: &AggregateResult,
    format: OutputFormat,
) -> Result<String, OutputError> {
    match format {
        OutputFormat::Table => Ok(render_table(result)),
        OutputFormat::Json => render_json(result),
        OutputFormat::Yaml => render_yaml(result),
    }
}

pub fn render_json(result: &AggregateResult) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(&result.to_value())?)
}

pub fn render_yaml(result: &AggregateResult) -> Result<String, OutputError> {
    Ok(serde_yaml::to_string(&result.to_value())?)
}

/// One row per record, one column per leaf path, followed by a summary line.
pub fn render_table(result: &AggregateResult) -> String {
    let rows: Vec<BTreeMap<String, Value>> = result.records().iter().map(path::flatten).collect();
    let columns = collect_columns(&rows);

    let mut lines = Vec::new();
    if !columns.is_empty() {
        let widths = compute_widths(&rows, &columns);
        lines.push(format_row(&columns, &widths));
        lines.push(format_separator(&widths));
        for fields in &rows {
            let row: Vec<String> = columns
                .iter()
                .map(|column| cell(fields, column))
                .collect();
            lines.push(format_row(&row, &widths));
        }
    }
    lines.push(summary_line(result));
    lines.join("\n")
}

fn summary_line(result: &AggregateResult) -> String {
    let mut summary = match result {
        AggregateResult::Global { record, .. } if is_empty_record(record) => {
            "no documents".to_string()
        }
        AggregateResult::Global { .. } => "global aggregate".to_string(),
        AggregateResult::Grouped { records, .. } => format!("buckets: {}", records.len()),
    };
    match (result, result.total()) {
        (AggregateResult::Global { .. }, Some(total)) => {
            summary.push_str(&format!(" (documents: {total})"));
        }
        (AggregateResult::Grouped { .. }, Some(total)) => {
            summary.push_str(&format!(" of {total}"));
        }
        (_, None) => {}
    }
    summary
}

fn is_empty_record(record: &Value) -> bool {
    record.as_object().is_some_and(|map| map.is_empty())
}

fn cell(
    fields: &BTreeMap<String, Value>,
    column: &str,
) -> String {
    fields
        .get(column)
        .map(value_to_cell)
        .unwrap_or_else(|| "-".to_string())
}

fn collect_columns(rows: &[BTreeMap<String, Value>]) -> Vec<String> {
    let mut set = BTreeSet::new();
    for fields in rows {
        for key in fields.keys() {
            set.insert(key.clone());
        }
    }
    set.into_iter().collect()
}

fn compute_widths(
    rows: &[BTreeMap<String, Value>],
    columns: &[String],
) -> Vec<usize> {
    columns
        .iter()
        .map(|column| {
            rows.iter()
                .map(|fields| cell(fields, column).chars().count())
                .fold(column.chars().count(), usize::max)
        })
        .collect()
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

fn format_row(
    cells: &[String],
    widths: &[usize],
) -> String {
    let mut out = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        out.push(' ');
        out.push_str(cell);
        out.push_str(&" ".repeat(width.saturating_sub(cell.chars().count())));
        out.push_str(" |");
    }
    out
}

fn format_separator(widths: &[usize]) -> String {
    let mut out = String::from("|");
    for width in widths {
        out.push(' ');
        out.push_str(&"-".repeat(*width));
        out.push_str(" |");
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{render_json, render_table, render_yaml};
    use crate::engine::AggregateResult;

    fn grouped() -> AggregateResult {
        AggregateResult::Grouped {
            records: vec![
                json!({"key": ["cat"], "stats": {"age": {"count": 2}}}),
                json!({"key": ["dog"], "stats": {"age": {"count": 1}}}),
            ],
            total: Some(4),
        }
    }

    #[test]
    fn renders_table_with_leaf_columns_and_summary() {
        let out = render_table(&grouped());
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "| key.0 | stats.age.count |");
        assert_eq!(lines[1], "| ----- | --------------- |");
        assert_eq!(lines[2], "| cat   | 2               |");
        assert_eq!(lines[3], "| dog   | 1               |");
        assert_eq!(lines[4], "buckets: 2 of 4");
    }

    #[test]
    fn renders_missing_cells_as_dash() {
        let result = AggregateResult::Grouped {
            records: vec![json!({"key": [null], "total": 1}), json!({"key": ["x"]})],
            total: None,
        };
        let out = render_table(&result);
        assert!(out.contains("| null  | 1     |"));
        assert!(out.contains("| x     | -     |"));
        assert!(out.ends_with("buckets: 2"));
    }

    #[test]
    fn renders_empty_global_result() {
        let result = AggregateResult::Global {
            record: json!({}),
            total: Some(0),
        };
        assert_eq!(render_table(&result), "no documents (documents: 0)");
    }

    #[test]
    fn renders_json_with_wrapped_total() {
        let out = render_json(&grouped()).expect("json output must serialize");
        assert!(out.starts_with('{'));
        assert!(out.contains("\"results\": ["));
        assert!(out.contains("\"total\": 4"));

        let bare = AggregateResult::Global {
            record: json!({"total": 6}),
            total: None,
        };
        let out = render_json(&bare).expect("json output must serialize");
        assert_eq!(out, "{\n  \"total\": 6\n}");
    }

    #[test]
    fn renders_yaml() {
        let out = render_yaml(&grouped()).expect("yaml output must serialize");
        assert!(out.contains("results:"));
        assert!(out.contains("- cat"));
        assert!(out.contains("total: 4"));
    }
}
