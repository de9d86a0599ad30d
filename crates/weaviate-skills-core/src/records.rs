//! Import-time record normalization.
//!
//! Rows read from CSV arrive as strings; JSON and JSONL rows arrive typed.
//! Either way every record passes through [`apply_mapping`] (rename keys)
//! and [`convert_types`] (coerce numeric/boolean strings, drop empties)
//! before it is sent to the service.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::Record;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("unsupported file format: '{0}'. Supported formats: .csv, .json, .jsonl")]
    UnsupportedFormat(String),

    #[error("invalid JSON in mapping: {0}")]
    InvalidMapping(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("JSON file must contain an array of objects, got {0}")]
    NotAnArray(&'static str),

    #[error("item {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("invalid JSON on line {line}: {message}")]
    InvalidJsonLine { line: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Jsonl,
}

impl FileFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn detect(path: &Path) -> Result<Self, RecordError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            "jsonl" => Ok(FileFormat::Jsonl),
            _ => Err(RecordError::UnsupportedFormat(format!(".{}", ext))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Jsonl => "jsonl",
        }
    }
}

/// Parse a `{"source_key": "property"}` mapping.
pub fn parse_mapping(text: &str) -> Result<HashMap<String, String>, RecordError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| RecordError::InvalidMapping(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| RecordError::InvalidMapping("mapping must be a JSON object".into()))?;
    obj.iter()
        .map(|(k, v)| match v.as_str() {
            Some(target) => Ok((k.clone(), target.to_string())),
            None => Err(RecordError::InvalidMapping(format!(
                "mapping target for '{}' must be a string",
                k
            ))),
        })
        .collect()
}

/// Rename keys according to `mapping`. Unmapped keys pass through.
pub fn apply_mapping(record: Record, mapping: &HashMap<String, String>) -> Record {
    if mapping.is_empty() {
        return record;
    }
    record
        .into_iter()
        .map(|(k, v)| match mapping.get(&k) {
            Some(target) => (target.clone(), v),
            None => (k, v),
        })
        .collect()
}

/// Coerce a string the way spreadsheet cells usually mean it.
pub fn coerce_str(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    let digits = s.strip_prefix('-').unwrap_or(s);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::from(i);
        }
    }
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let numeric = !(whole.is_empty() && frac.is_empty())
        && whole.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit());
    if numeric {
        if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(s.to_string())
}

/// Drop null and empty-string values, and coerce the remaining strings.
pub fn convert_types(record: Record) -> Record {
    record
        .into_iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some((k, coerce_str(&s))),
            other => Some((k, other)),
        })
        .collect()
}

/// Parse a JSON document holding an array of objects.
pub fn parse_json_array(text: &str) -> Result<Vec<Record>, RecordError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| RecordError::InvalidJson(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        other => return Err(RecordError::NotAnArray(json_kind(&other))),
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(obj) => Ok(obj),
            _ => Err(RecordError::NotAnObject { index }),
        })
        .collect()
}

/// Parse JSON Lines: one object per line, blank lines skipped.
pub fn parse_jsonl(text: &str) -> Result<Vec<Record>, RecordError> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value =
            serde_json::from_str(line).map_err(|e| RecordError::InvalidJsonLine {
                line: i + 1,
                message: e.to_string(),
            })?;
        match value {
            Value::Object(obj) => out.push(obj),
            _ => {
                return Err(RecordError::InvalidJsonLine {
                    line: i + 1,
                    message: "expected a JSON object".into(),
                })
            }
        }
    }
    Ok(out)
}

/// Build a record from CSV header names and one row of cells.
pub fn record_from_row(headers: &[String], row: &[String]) -> Record {
    let mut record = Map::new();
    for (h, cell) in headers.iter().zip(row.iter()) {
        record.insert(h.clone(), Value::String(cell.clone()));
    }
    record
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
