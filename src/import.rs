//! `wsk import`: load CSV, JSON or JSONL records into a collection.
//!
//! ```text
//! file ──read──▶ records ──apply_mapping──▶ convert_types ──batches──▶ insert_objects
//! ```
//!
//! The format follows the file extension. CSV files must start with a
//! header row; the delimiter is picked from `,` `;` `\t` `|` by counting
//! occurrences in that row. Multi-tenant collections require `--tenant`; a
//! tenant given for a single-tenant collection is dropped with a warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use weaviate_skills_core::filter::Record;
use weaviate_skills_core::records::{
    apply_mapping, convert_types, parse_json_array, parse_jsonl, parse_mapping, record_from_row,
    FileFormat,
};
use weaviate_skills_core::service::{BatchOutcome, QueryService};

use crate::client::WeaviateClient;
use crate::config::Config;
use crate::output::print_json;

/// Errors echoed in the summary.
const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct ImportArgs {
    pub file: PathBuf,
    pub collection: String,
    pub mapping: Option<String>,
    pub tenant: Option<String>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub collection: String,
    pub tenant: Option<String>,
    pub total_objects: usize,
    pub imported: usize,
    pub failed: usize,
    pub file: String,
    pub format: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

fn sniff_delimiter(header_line: &str) -> u8 {
    [b',', b';', b'\t', b'|']
        .into_iter()
        .max_by_key(|d| header_line.bytes().filter(|b| b == d).count())
        .filter(|d| header_line.as_bytes().contains(d))
        .unwrap_or(b',')
}

/// Parse CSV text into string-valued records keyed by the header row.
pub fn read_csv(text: &str) -> Result<Vec<Record>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_line = text.lines().next().unwrap_or_default();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(sniff_delimiter(first_line))
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut out = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Invalid CSV row {}", i + 2))?;
        let cells: Vec<String> = row.iter().map(str::to_string).collect();
        out.push(record_from_row(&headers, &cells));
    }
    Ok(out)
}

/// Read and normalize every record in a file.
pub fn load_records(path: &Path, mapping: &HashMap<String, String>) -> Result<(FileFormat, Vec<Record>)> {
    let format = FileFormat::detect(path)?;
    tracing::info!("Detected file format: {}", format.as_str().to_uppercase());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let raw = match format {
        FileFormat::Csv => read_csv(&text)?,
        FileFormat::Json => parse_json_array(&text)?,
        FileFormat::Jsonl => parse_jsonl(&text)?,
    };
    let records = raw
        .into_iter()
        .map(|r| convert_types(apply_mapping(r, mapping)))
        .collect();
    Ok((format, records))
}

/// Insert records in batches and summarize.
pub async fn import_records(
    svc: &dyn QueryService,
    collection: &str,
    tenant: Option<&str>,
    records: &[Record],
    batch_size: usize,
) -> Result<(Option<String>, BatchOutcome)> {
    if batch_size < 1 {
        bail!("Batch size must be at least 1");
    }
    let info = match svc.get_collection(collection).await? {
        Some(info) => info,
        None => bail!(
            "Collection '{}' does not exist. Use `wsk collections list` to see available collections.",
            collection
        ),
    };

    let collection = info.name.as_str();

    let tenant = match (info.is_multi_tenant(), tenant) {
        (true, None) => bail!(
            "Collection '{}' is multi-tenant, --tenant parameter is required",
            collection
        ),
        (false, Some(_)) => {
            tracing::warn!(
                "Collection '{}' is not multi-tenant, --tenant parameter will be ignored",
                collection
            );
            None
        }
        (_, t) => t,
    };
    if let Some(t) = tenant {
        tracing::info!("Using tenant: {}", t);
    }

    tracing::info!(
        "Importing {} objects in batches of {}...",
        records.len(),
        batch_size
    );
    let mut total = BatchOutcome::default();
    for (n, chunk) in records.chunks(batch_size).enumerate() {
        let outcome = match svc.insert_objects(collection, tenant, chunk).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Batch {} failed: {:#}", n + 1, e);
                BatchOutcome::rejected(chunk.len(), format!("batch failed: {:#}", e))
            }
        };
        for e in outcome.errors.iter().take(5) {
            tracing::warn!("Object {}: {}", n * batch_size + e.index, e.message);
        }
        total.merge(outcome, n * batch_size);
        tracing::info!(
            "Progress: {}/{} objects processed",
            (n * batch_size + chunk.len()),
            records.len()
        );
    }
    Ok((tenant.map(str::to_string), total))
}

pub fn render(summary: &ImportSummary) -> String {
    let mut out = format!("**Collection:** {}\n", summary.collection);
    if let Some(t) = &summary.tenant {
        out.push_str(&format!("**Tenant:** {}\n", t));
    }
    out.push_str(&format!("**Total Objects:** {}\n", summary.total_objects));
    out.push_str(&format!("**Successfully Imported:** {}\n", summary.imported));
    if summary.failed > 0 {
        out.push_str(&format!("**Failed:** {}\n", summary.failed));
        if !summary.errors.is_empty() {
            out.push_str("\n**Sample Errors:**\n");
            for e in summary.errors.iter().take(5) {
                out.push_str(&format!("  - {}\n", e));
            }
        }
    }
    out
}

pub async fn run_import(config: &Config, args: &ImportArgs, json: bool) -> Result<()> {
    if !args.file.exists() {
        bail!("File not found: {}", args.file.display());
    }
    let mapping = match &args.mapping {
        Some(text) => parse_mapping(text)?,
        None => HashMap::new(),
    };
    let batch_size = args.batch_size.unwrap_or(config.import.batch_size);
    if batch_size < 1 {
        bail!("Batch size must be at least 1");
    }

    tracing::info!("Reading file: {}", args.file.display());
    let (format, records) = load_records(&args.file, &mapping)?;
    if records.is_empty() {
        bail!("No data found in file");
    }
    tracing::info!("Loaded {} objects from file", records.len());

    let client = WeaviateClient::new(config)?;
    let (tenant, outcome) = import_records(
        &client,
        &args.collection,
        args.tenant.as_deref(),
        &records,
        batch_size,
    )
    .await?;

    let summary = ImportSummary {
        collection: args.collection.clone(),
        tenant,
        total_objects: records.len(),
        imported: outcome.inserted,
        failed: outcome.failed(),
        file: args.file.display().to_string(),
        format: format.as_str().to_string(),
        errors: outcome
            .errors
            .iter()
            .take(MAX_REPORTED_ERRORS)
            .map(|e| format!("Object {}: {}", e.index, e.message))
            .collect(),
    };

    if json || config.output.prefers_json() {
        print_json(&summary)?;
    } else {
        tracing::info!("Import completed");
        print!("{}", render(&summary));
    }
    if summary.failed > 0 {
        bail!("{} of {} objects failed to import", summary.failed, summary.total_objects);
    }
    Ok(())
}
