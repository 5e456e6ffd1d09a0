use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::document::Document;
use crate::error::{CliError, InputError};
use crate::spec::AggregateSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputFormat {
    Json,
    JsonLines,
    Yaml,
}

impl InputFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            Some("jsonl" | "ndjson") => Self::JsonLines,
            _ => Self::Json,
        }
    }
}

/// Loads documents from `path`, or from stdin when `path` is `-`.
///
/// Stdin is read as a JSON array and, failing that, as JSON lines.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, InputError> {
    let content = read_source(path)?;
    let values = if is_stdin(path) {
        parse_json(path, &content)
            .or_else(|error| parse_json_lines(path, &content).map_err(|_| error))?
    } else {
        match InputFormat::from_path(path) {
            InputFormat::Json => parse_json(path, &content)?,
            InputFormat::JsonLines => parse_json_lines(path, &content)?,
            InputFormat::Yaml => parse_yaml(path, &content)?,
        }
    };

    let documents = values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            Document::try_from(value).map_err(|_| InputError::NotAMapping {
                path: path.to_path_buf(),
                index,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(path = %path.display(), documents = documents.len(), "loaded documents");
    Ok(documents)
}

/// Loads an aggregate spec file; YAML by extension, JSON otherwise.
pub fn load_spec(path: &Path) -> Result<AggregateSpec, CliError> {
    let content = read_source(path)?;
    let spec = match InputFormat::from_path(path) {
        InputFormat::Yaml => AggregateSpec::from_yaml_str(&content)?,
        InputFormat::Json | InputFormat::JsonLines => AggregateSpec::from_json_str(&content)?,
    };
    Ok(spec)
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_source(path: &Path) -> Result<String, InputError> {
    let read_error = |source| InputError::Read {
        path: path.to_path_buf(),
        source,
    };

    if is_stdin(path) {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(read_error)?;
        return Ok(content);
    }
    std::fs::read_to_string(path).map_err(read_error)
}

fn parse_json(
    path: &Path,
    content: &str,
) -> Result<Vec<Value>, InputError> {
    let value: Value = serde_json::from_str(content).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    into_sequence(path, value)
}

fn parse_json_lines(
    path: &Path,
    content: &str,
) -> Result<Vec<Value>, InputError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| InputError::JsonLine {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })
        })
        .collect()
}

fn parse_yaml(
    path: &Path,
    content: &str,
) -> Result<Vec<Value>, InputError> {
    let value: Value = serde_yaml::from_str(content).map_err(|source| InputError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    into_sequence(path, value)
}

fn into_sequence(
    path: &Path,
    value: Value,
) -> Result<Vec<Value>, InputError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(InputError::NotASequence {
            path: PathBuf::from(path),
        }),
    }
}
