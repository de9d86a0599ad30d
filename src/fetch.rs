//! `wsk fetch`: retrieve objects by UUID or by structured filter.
//!
//! The filter is parsed before any connection is made, so a malformed
//! filter fails fast and offline. With `--strict`, the parsed filter is
//! checked again against the collection's property names.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use weaviate_skills_core::filter::{parse_filter_str, parse_filter_with_catalog, FilterExpr};
use weaviate_skills_core::models::{CollectionInfo, DataObject};
use weaviate_skills_core::query::{split_properties, FetchRequest};
use weaviate_skills_core::service::QueryService;

use crate::client::WeaviateClient;
use crate::config::Config;
use crate::output::{cell, format_ts_iso, markdown_table, print_json};

#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    pub collection: String,
    pub id: Option<String>,
    pub filters: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub properties: Option<String>,
    pub strict: bool,
}

/// What `fetch` will do, resolved from its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPlan {
    ById {
        collection: String,
        id: String,
        properties: Option<Vec<String>>,
    },
    Query(FetchRequest),
}

/// Validate arguments and parse the filter. No I/O.
pub fn plan(args: &FetchArgs, default_limit: usize) -> Result<FetchPlan> {
    let properties = split_properties(args.properties.as_deref());
    if let Some(id) = &args.id {
        if args.filters.is_some() {
            bail!("--id and --filters cannot be combined");
        }
        let id = uuid::Uuid::parse_str(id.trim())
            .with_context(|| format!("Invalid UUID: {}", id))?;
        return Ok(FetchPlan::ById {
            collection: args.collection.clone(),
            id: id.to_string(),
            properties,
        });
    }
    let filter = match &args.filters {
        Some(text) => parse_filter_str(text)?,
        None => None,
    };
    Ok(FetchPlan::Query(FetchRequest {
        collection: args.collection.clone(),
        filter,
        limit: args.limit.unwrap_or(default_limit),
        offset: args.offset,
        properties,
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchedObject {
    pub uuid: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub metadata: FetchedMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchedMetadata {
    pub creation_time: Option<String>,
}

impl From<DataObject> for FetchedObject {
    fn from(obj: DataObject) -> Self {
        Self {
            uuid: obj.uuid,
            properties: obj.properties,
            metadata: FetchedMetadata {
                creation_time: obj.metadata.creation_time_unix.map(format_ts_iso),
            },
        }
    }
}

fn check_strict(filter: &FilterExpr, info: &CollectionInfo) -> Result<()> {
    parse_filter_with_catalog(&filter.to_json(), info)?;
    Ok(())
}

/// Execute a plan.
pub async fn fetch(svc: &dyn QueryService, plan: &FetchPlan, strict: bool) -> Result<Vec<FetchedObject>> {
    let collection = match plan {
        FetchPlan::ById { collection, .. } => collection,
        FetchPlan::Query(req) => &req.collection,
    };
    let info = match svc.get_collection(collection).await? {
        Some(info) => info,
        None => bail!("Collection '{}' not found.", collection),
    };

    if info.name != *collection {
        tracing::info!("Using collection name '{}'", info.name);
    }

    match plan {
        FetchPlan::ById { id, properties, .. } => {
            tracing::info!("Fetching object {}...", id);
            match svc
                .fetch_object_by_id(&info.name, id, properties.as_deref())
                .await?
            {
                Some(obj) => Ok(vec![obj.into()]),
                None => bail!("Object {} not found.", id),
            }
        }
        FetchPlan::Query(req) => {
            if strict {
                if let Some(filter) = &req.filter {
                    check_strict(filter, &info)?;
                }
            }
            let req = FetchRequest {
                collection: info.name.clone(),
                ..req.clone()
            };
            tracing::info!("Fetching objects from '{}'...", req.collection);
            let objects = svc.fetch_objects(&req).await?;
            tracing::info!("Fetched {} objects", objects.len());
            Ok(objects.into_iter().map(FetchedObject::from).collect())
        }
    }
}

/// Markdown table: UUID plus every property seen, sorted by name.
pub fn render(objects: &[FetchedObject]) -> String {
    if objects.is_empty() {
        return "No objects found.\n".to_string();
    }
    let mut keys: Vec<&String> = objects.iter().flat_map(|o| o.properties.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut headers = vec!["UUID".to_string()];
    headers.extend(keys.iter().map(|k| k.to_string()));
    let rows: Vec<Vec<String>> = objects
        .iter()
        .map(|o| {
            let mut row = vec![o.uuid.clone()];
            for k in &keys {
                row.push(match o.properties.get(*k) {
                    Some(v) => cell(v, true),
                    None => "-".to_string(),
                });
            }
            row
        })
        .collect();
    format!(
        "## Found {} Objects\n\n{}",
        objects.len(),
        markdown_table(&headers, &rows)
    )
}

pub async fn run_fetch(config: &Config, args: &FetchArgs, json: bool) -> Result<()> {
    let plan = plan(args, config.search.default_limit)?;
    let client = WeaviateClient::new(config)?;
    let objects = fetch(&client, &plan, args.strict).await?;
    if json || config.output.prefers_json() {
        print_json(&objects)
    } else {
        print!("{}", render(&objects));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weaviate_skills_core::filter::ParseError;
    use weaviate_skills_core::schema::{parse_properties, CollectionDefinition};
    use weaviate_skills_core::service::memory::InMemoryService;

    async fn products() -> InMemoryService {
        let svc = InMemoryService::new();
        svc.create_collection(&CollectionDefinition {
            name: "Product".into(),
            properties: parse_properties(&json!([
                {"name": "name", "data_type": "text"},
                {"name": "price", "data_type": "number"},
                {"name": "in_stock", "data_type": "boolean"}
            ]))
            .unwrap(),
            ..Default::default()
        })
        .await
        .unwrap();
        let records: Vec<_> = [
            json!({"name": "Lamp", "price": 40, "in_stock": true}),
            json!({"name": "Desk", "price": 60, "in_stock": true}),
            json!({"name": "Chair", "price": 45.5, "in_stock": false}),
        ]
        .iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
        svc.insert_objects("Product", None, &records).await.unwrap();
        svc
    }

    fn args(filters: Option<&str>) -> FetchArgs {
        FetchArgs {
            collection: "Product".into(),
            filters: filters.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_with_implicit_and() {
        let svc = products().await;
        let p = plan(
            &args(Some(
                r#"[{"property":"price","operator":"less_than","value":50},
                    {"property":"in_stock","operator":"equal","value":true}]"#,
            )),
            10,
        )
        .unwrap();
        let objs = fetch(&svc, &p, false).await.unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].properties["name"], "Lamp");
        assert!(objs[0].metadata.creation_time.is_some());

        let md = render(&objs);
        assert!(md.starts_with("## Found 1 Objects\n"));
        assert!(md.contains("| UUID | in_stock | name | price |"));
    }

    #[tokio::test]
    async fn test_fetch_lower_case_collection_name() {
        let svc = products().await;
        let mut a = args(Some(r#"{"property":"name","operator":"equal","value":"Desk"}"#));
        a.collection = "product".into();
        let objs = fetch(&svc, &plan(&a, 10).unwrap(), true).await.unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].properties["name"], "Desk");

        let mut a = args(None);
        a.collection = "product".into();
        a.id = Some(objs[0].uuid.clone());
        let by_id = fetch(&svc, &plan(&a, 10).unwrap(), false).await.unwrap();
        assert_eq!(by_id[0].properties["name"], "Desk");
    }

    #[test]
    fn test_invalid_filter_fails_before_connecting() {
        let err = plan(
            &args(Some(r#"{"property":"x","operator":"contains_any","value":"nope"}"#)),
            10,
        )
        .unwrap_err();
        let parse = err.downcast_ref::<ParseError>().unwrap();
        assert_eq!(parse.path, "$.value");
    }

    #[test]
    fn test_plan_by_id() {
        let mut a = args(None);
        a.id = Some("not-a-uuid".into());
        assert!(plan(&a, 10).is_err());
        a.id = Some("6F9619FF-8B86-D011-B42D-00C04FC964FF".into());
        match plan(&a, 10).unwrap() {
            FetchPlan::ById { id, .. } => assert_eq!(id, "6f9619ff-8b86-d011-b42d-00c04fc964ff"),
            other => panic!("unexpected plan {:?}", other),
        }
        a.filters = Some("[]".into());
        assert!(plan(&a, 10).is_err());
    }

    #[tokio::test]
    async fn test_strict_rejects_unknown_property() {
        let svc = products().await;
        let p = plan(&args(Some(r#"{"property":"colour","operator":"equal","value":"red"}"#)), 10)
            .unwrap();
        assert!(fetch(&svc, &p, false).await.unwrap().is_empty());
        let err = fetch(&svc, &p, true).await.unwrap_err();
        assert!(err.to_string().contains("colour"), "{}", err);
    }

    #[tokio::test]
    async fn test_missing_collection_and_object() {
        let svc = products().await;
        let mut a = args(None);
        a.collection = "Nope".into();
        let err = fetch(&svc, &plan(&a, 10).unwrap(), false).await.unwrap_err();
        assert!(err.to_string().contains("not found"));

        let mut a = args(None);
        a.id = Some("00000000-0000-0000-0000-000000000000".into());
        let err = fetch(&svc, &plan(&a, 10).unwrap(), false).await.unwrap_err();
        assert!(err.to_string().contains("Object"));
    }

    #[test]
    fn test_render_truncates_long_cells() {
        let obj = FetchedObject {
            uuid: "u".into(),
            properties: json!({"body": "y".repeat(120)}).as_object().cloned().unwrap(),
            metadata: FetchedMetadata { creation_time: None },
        };
        let md = render(&[obj]);
        assert!(md.contains(&format!("| u | {}... |", "y".repeat(97))));
    }
}
