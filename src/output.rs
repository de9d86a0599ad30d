//! Markdown and JSON rendering for command results.
//!
//! Markdown output is meant to be pasted into a chat or a document: a
//! `## Title` heading, `**Key:** value` lines, then a pipe table.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

/// Longest cell kept verbatim when truncation is on.
pub const MAX_CELL_CHARS: usize = 100;

/// Render one value as table-cell text.
///
/// Newlines become spaces and `|` is escaped. With `truncate`, text longer
/// than [`MAX_CELL_CHARS`] keeps its first 97 characters plus `...`.
pub fn cell(value: &Value, truncate: bool) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    };
    let flat = raw.replace("\r\n", " ").replace('\n', " ").replace('|', "\\|");
    if truncate && flat.chars().count() > MAX_CELL_CHARS {
        let head: String = flat.chars().take(MAX_CELL_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        flat
    }
}

/// A pipe table. Every row must have as many cells as there are headers.
pub fn markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!(
        "| {} |\n",
        vec!["---"; headers.len()].join(" | ")
    ));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

/// Format a Unix timestamp in milliseconds as ISO 8601 (UTC).
pub fn format_ts_iso(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Format an optional score with four decimals, or `N/A`.
pub fn score(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_flattens_and_escapes() {
        assert_eq!(cell(&json!("a\nb|c"), false), "a b\\|c");
        assert_eq!(cell(&json!(42), false), "42");
        assert_eq!(cell(&json!(["x", 1]), false), r#"["x",1]"#);
        assert_eq!(cell(&Value::Null, false), "-");
    }

    #[test]
    fn test_cell_truncation() {
        let long = "x".repeat(150);
        let out = cell(&json!(long), true);
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with("..."));
        assert_eq!(cell(&json!("x".repeat(100)), true).len(), 100);
        assert_eq!(cell(&json!(long), false).len(), 150);
    }

    #[test]
    fn test_markdown_table() {
        let t = markdown_table(
            &["#".into(), "Name".into()],
            &[vec!["1".into(), "a".into()]],
        );
        assert_eq!(t, "| # | Name |\n| --- | --- |\n| 1 | a |\n");
    }

    #[test]
    fn test_format_ts_iso() {
        assert_eq!(format_ts_iso(1_700_000_000_000), "2023-11-14T22:13:20Z");
        assert_eq!(score(Some(0.5)), "0.5000");
        assert_eq!(score(None), "N/A");
    }
}
