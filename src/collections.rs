//! `wsk collections list|get|create|explore`.
//!
//! Each subcommand has a structured core function written against
//! [`QueryService`] and a `run_*` wrapper that connects and prints.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use weaviate_skills_core::models::{CollectionInfo, PropertyMetrics};
use weaviate_skills_core::query::{AggregateRequest, FetchRequest};
use weaviate_skills_core::schema::{normalize_collection_name, parse_properties, CollectionDefinition};
use weaviate_skills_core::service::QueryService;

use crate::client::WeaviateClient;
use crate::config::Config;
use crate::output::{cell, markdown_table, print_json};

#[derive(Debug, Clone, Serialize)]
pub struct PropertySummary {
    pub name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorizerSummary {
    pub vectorizer: String,
    pub model: Option<String>,
}

/// A collection as reported by `collections get`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionDetails {
    pub name: String,
    pub description: Option<String>,
    pub vectorizer_config: Option<VectorizerSummary>,
    pub properties: Vec<PropertySummary>,
    pub replication_factor: Option<u32>,
    pub multi_tenancy_enabled: bool,
}

impl From<&CollectionInfo> for CollectionDetails {
    fn from(info: &CollectionInfo) -> Self {
        Self {
            name: info.name.clone(),
            description: info.description.clone(),
            vectorizer_config: info.vectorizer.as_ref().map(|v| VectorizerSummary {
                vectorizer: v.clone(),
                model: info.vectorizer_model().map(str::to_string),
            }),
            properties: info
                .properties
                .iter()
                .map(|p| PropertySummary {
                    name: p.name.clone(),
                    data_type: p.data_type_name().to_string(),
                    description: p.description.clone(),
                })
                .collect(),
            replication_factor: info.replication_factor(),
            multi_tenancy_enabled: info.is_multi_tenant(),
        }
    }
}

pub async fn list_collections(svc: &dyn QueryService) -> Result<Vec<CollectionDetails>> {
    tracing::info!("Fetching collections...");
    let collections = svc.list_collections().await?;
    tracing::info!("Found {} collections.", collections.len());
    Ok(collections.iter().map(CollectionDetails::from).collect())
}

pub fn render_list(collections: &[CollectionDetails]) -> String {
    if collections.is_empty() {
        return "No collections found.\n".to_string();
    }
    let rows: Vec<Vec<String>> = collections
        .iter()
        .map(|c| {
            let props: Vec<&str> = c.properties.iter().map(|p| p.name.as_str()).collect();
            vec![
                c.name.clone(),
                c.description.clone().unwrap_or_else(|| "N/A".into()),
                props.join(", "),
            ]
        })
        .collect();
    format!(
        "## Collections\n\n{}",
        markdown_table(
            &["Name".into(), "Description".into(), "Properties".into()],
            &rows
        )
    )
}

pub async fn get_collection(svc: &dyn QueryService, name: &str) -> Result<CollectionDetails> {
    match svc.get_collection(name).await? {
        Some(info) => Ok(CollectionDetails::from(&info)),
        None => bail!("Collection '{}' not found.", name),
    }
}

pub fn render_details(c: &CollectionDetails) -> String {
    let mut out = format!("## Collection: {}\n\n", c.name);
    out.push_str(&format!(
        "**Description:** {}\n",
        c.description.as_deref().unwrap_or("N/A")
    ));
    if let Some(v) = &c.vectorizer_config {
        out.push_str(&format!("**Vectorizer:** {}\n", v.vectorizer));
        if let Some(model) = &v.model {
            out.push_str(&format!("**Model:** {}\n", model));
        }
    }
    out.push_str(&format!(
        "**Replication Factor:** {}\n",
        c.replication_factor
            .map(|f| f.to_string())
            .unwrap_or_else(|| "N/A".into())
    ));
    out.push_str(&format!(
        "**Multi-Tenancy:** {}\n",
        if c.multi_tenancy_enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    ));
    if !c.properties.is_empty() {
        out.push_str(&format!("\n### Properties ({})\n\n", c.properties.len()));
        let rows: Vec<Vec<String>> = c
            .properties
            .iter()
            .map(|p| {
                vec![
                    p.name.clone(),
                    p.data_type.clone(),
                    p.description.clone().unwrap_or_else(|| "-".into()),
                ]
            })
            .collect();
        out.push_str(&markdown_table(
            &["Name".into(), "Data Type".into(), "Description".into()],
            &rows,
        ));
    }
    out
}

/// Arguments of `collections create`, before validation.
#[derive(Debug, Clone, Default)]
pub struct CreateArgs {
    pub name: String,
    pub properties: String,
    pub description: Option<String>,
    pub vectorizer: Option<String>,
    pub replication_factor: Option<u32>,
    pub multi_tenancy: bool,
    pub auto_tenant_creation: bool,
}

/// Validate `collections create` arguments into a definition.
///
/// Runs before any connection is made.
pub fn build_definition(args: &CreateArgs) -> Result<CollectionDefinition> {
    let (name, changed) = normalize_collection_name(args.name.trim());
    if changed {
        tracing::warn!(
            "Collection name '{}' capitalized to '{}'",
            args.name.trim(),
            name
        );
    }
    let raw: Value =
        serde_json::from_str(&args.properties).context("Invalid JSON in --properties")?;
    let def = CollectionDefinition {
        name,
        description: args.description.clone(),
        properties: parse_properties(&raw)?,
        vectorizer: args.vectorizer.clone(),
        replication_factor: args.replication_factor,
        multi_tenancy: args.multi_tenancy,
        auto_tenant_creation: args.auto_tenant_creation,
    };
    def.validate()?;
    Ok(def)
}

pub async fn create_collection(
    svc: &dyn QueryService,
    def: &CollectionDefinition,
) -> Result<CollectionDetails> {
    if svc.get_collection(&def.name).await?.is_some() {
        bail!("Collection '{}' already exists.", def.name);
    }
    tracing::info!("Creating collection '{}'...", def.name);
    let info = svc.create_collection(def).await?;
    Ok(CollectionDetails::from(&info))
}

#[derive(Debug, Clone, Serialize)]
pub struct ExploredProperty {
    pub data_type: String,
    #[serde(flatten)]
    pub metrics: PropertyMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleObject {
    pub uuid: String,
    pub properties: Map<String, Value>,
}

/// Result of `collections explore`.
#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub collection: String,
    pub total_count: u64,
    pub metrics: BTreeMap<String, ExploredProperty>,
    /// Set when statistics were requested but the aggregate query failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
    pub sample_limit: usize,
    pub sample_objects: Vec<SampleObject>,
}

/// Object count, per-property statistics and a few sample objects.
///
/// A failed statistics query is reported in the result rather than failing
/// the command; the count-only query used with `with_metrics == false` is
/// best effort.
pub async fn explore_collection(
    svc: &dyn QueryService,
    name: &str,
    limit: usize,
    with_metrics: bool,
) -> Result<Exploration> {
    let info = match svc.get_collection(name).await? {
        Some(info) => info,
        None => bail!("Collection '{}' not found.", name),
    };

    let req = if with_metrics {
        tracing::info!("Calculating metrics...");
        AggregateRequest::for_collection(&info)
    } else {
        AggregateRequest::count_only(info.name.clone())
    };
    let (total_count, properties, metrics_error) = match svc.aggregate(&req).await {
        Ok(agg) => (agg.total_count, agg.properties, None),
        Err(e) if with_metrics => {
            tracing::warn!("Aggregation failed: {:#}", e);
            (0, BTreeMap::new(), Some(format!("{:#}", e)))
        }
        Err(e) => {
            tracing::debug!("Count failed: {:#}", e);
            (0, BTreeMap::new(), None)
        }
    };
    let metrics = properties
        .into_iter()
        .map(|(prop, metrics)| {
            let data_type = info
                .property(&prop)
                .map(|p| p.data_type_name().to_string())
                .unwrap_or_else(|| "unknown".into());
            (prop, ExploredProperty { data_type, metrics })
        })
        .collect();

    let sample_objects = if limit > 0 {
        tracing::info!("Fetching {} sample objects...", limit);
        let req = FetchRequest {
            limit,
            ..FetchRequest::new(info.name.clone())
        };
        svc.fetch_objects(&req)
            .await?
            .into_iter()
            .map(|o| SampleObject {
                uuid: o.uuid,
                properties: o.properties,
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(Exploration {
        collection: info.name,
        total_count,
        metrics,
        metrics_error,
        sample_limit: limit,
        sample_objects,
    })
}

fn metric_label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn render_exploration(e: &Exploration) -> String {
    let mut out = format!("## Collection Explorer: {}\n\n", e.collection);
    out.push_str(&format!("**Total Objects:** {}\n", e.total_count));

    if let Some(err) = &e.metrics_error {
        out.push_str(&format!("**Metrics unavailable:** {}\n", err));
    }
    if !e.metrics.is_empty() {
        out.push_str("\n### Property Metrics\n\n");
        for (name, prop) in &e.metrics {
            out.push_str(&format!("**{}** ({})\n", name, prop.data_type));
            for (field, value) in prop.metrics.scalar_fields() {
                out.push_str(&format!("- {}: {}\n", metric_label(field), cell(&value, false)));
            }
            if !prop.metrics.top_occurrences.is_empty() {
                out.push_str("- Top Values:\n");
                for top in &prop.metrics.top_occurrences {
                    out.push_str(&format!(
                        "    - {} ({})\n",
                        cell(&Value::from(top.value.as_str()), false),
                        top.count
                    ));
                }
            }
            out.push('\n');
        }
    }

    if !e.sample_objects.is_empty() {
        if e.metrics.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("### Sample Objects (Limit: {})\n\n", e.sample_limit));
        let keys: BTreeSet<&String> = e
            .sample_objects
            .iter()
            .flat_map(|o| o.properties.keys())
            .collect();
        let mut headers = vec!["#".to_string(), "UUID".to_string()];
        headers.extend(keys.iter().map(|k| k.to_string()));
        let rows: Vec<Vec<String>> = e
            .sample_objects
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let mut row = vec![(i + 1).to_string(), o.uuid.clone()];
                row.extend(
                    keys.iter()
                        .map(|k| cell(o.properties.get(*k).unwrap_or(&Value::Null), true)),
                );
                row
            })
            .collect();
        out.push_str(&markdown_table(&headers, &rows));
    }
    out
}

pub async fn run_list(config: &Config, json: bool) -> Result<()> {
    let client = WeaviateClient::new(config)?;
    let collections = list_collections(&client).await?;
    if json || config.output.prefers_json() {
        print_json(&collections)
    } else {
        print!("{}", render_list(&collections));
        Ok(())
    }
}

pub async fn run_get(config: &Config, name: &str, json: bool) -> Result<()> {
    let client = WeaviateClient::new(config)?;
    tracing::info!("Fetching collection details...");
    let details = get_collection(&client, name).await?;
    if json || config.output.prefers_json() {
        print_json(&details)
    } else {
        print!("{}", render_details(&details));
        Ok(())
    }
}

pub async fn run_create(config: &Config, args: &CreateArgs, json: bool) -> Result<()> {
    let def = build_definition(args)?;
    let client = WeaviateClient::new(config)?;
    let details = create_collection(&client, &def).await?;
    if json || config.output.prefers_json() {
        print_json(&details)
    } else {
        println!("Collection '{}' created successfully.\n", details.name);
        print!("{}", render_details(&details));
        Ok(())
    }
}

pub async fn run_explore(
    config: &Config,
    name: &str,
    limit: usize,
    no_metrics: bool,
    json: bool,
) -> Result<()> {
    let client = WeaviateClient::new(config)?;
    let exploration = explore_collection(&client, name, limit, !no_metrics).await?;
    if json || config.output.prefers_json() {
        print_json(&exploration)
    } else {
        print!("{}", render_exploration(&exploration));
        Ok(())
    }
}
