//! `wsk search`: keyword (BM25), semantic (nearText) and hybrid search.
//!
//! All ranking happens in the cluster. This module builds the request,
//! checks the collection exists, and shapes the hits for output.
//!
//! | Mode | Uses | Score column |
//! |------|------|--------------|
//! | `keyword` | `--properties` to restrict the BM25 fields | `score` |
//! | `semantic` | `--distance`, `--target-vector` | `distance` |
//! | `hybrid` | `--alpha`, `--properties`, `--target-vector` | `score` |

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use weaviate_skills_core::filter::parse_filter_str;
use weaviate_skills_core::models::DataObject;
use weaviate_skills_core::query::{split_properties, SearchMode, SearchRequest};
use weaviate_skills_core::service::QueryService;

use crate::client::WeaviateClient;
use crate::config::Config;
use crate::output::{cell, markdown_table, print_json, score};

#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub mode: SearchMode,
    pub query: String,
    pub collection: String,
    pub limit: Option<usize>,
    pub properties: Option<String>,
    pub alpha: Option<f64>,
    pub distance: Option<f64>,
    pub target_vector: Option<String>,
    pub filters: Option<String>,
}

/// Validate arguments into a request. No I/O.
pub fn build_request(args: &SearchArgs, config: &Config) -> Result<SearchRequest> {
    if args.query.trim().is_empty() {
        bail!("--query must not be empty");
    }
    let alpha = match args.mode {
        SearchMode::Hybrid => Some(args.alpha.unwrap_or(config.search.default_alpha)),
        _ => {
            if args.alpha.is_some() {
                tracing::warn!("--alpha only applies to hybrid search; ignoring it");
            }
            None
        }
    };
    if let Some(a) = alpha {
        if !(0.0..=1.0).contains(&a) {
            bail!("--alpha must be between 0.0 and 1.0, got {}", a);
        }
    }
    if let Some(d) = args.distance {
        if !d.is_finite() {
            bail!("--distance must be a finite number, got {}", d);
        }
    }
    if args.distance.is_some() && args.mode != SearchMode::Semantic {
        tracing::warn!("--distance only applies to semantic search; ignoring it");
    }
    let properties = split_properties(args.properties.as_deref());
    if properties.is_some() && args.mode == SearchMode::Semantic {
        tracing::warn!("--properties does not restrict semantic search; ignoring it");
    }

    Ok(SearchRequest {
        mode: args.mode,
        collection: args.collection.clone(),
        query: args.query.clone(),
        limit: args.limit.unwrap_or(config.search.default_limit),
        query_properties: if args.mode == SearchMode::Semantic {
            None
        } else {
            properties
        },
        alpha,
        distance: if args.mode == SearchMode::Semantic {
            args.distance
        } else {
            None
        },
        target_vector: if args.mode == SearchMode::Keyword {
            None
        } else {
            args.target_vector.clone()
        },
        filter: match &args.filters {
            Some(text) => parse_filter_str(text)?,
            None => None,
        },
        return_properties: None,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub uuid: String,
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl From<DataObject> for SearchHit {
    fn from(obj: DataObject) -> Self {
        Self {
            uuid: obj.uuid,
            properties: obj.properties,
            score: obj.metadata.score,
            explain_score: obj.metadata.explain_score,
            distance: obj.metadata.distance,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub mode: SearchMode,
    pub query: String,
    pub collection: String,
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    pub target_vector: Option<String>,
    pub objects: Vec<SearchHit>,
    pub object_count: usize,
}

pub async fn search(svc: &dyn QueryService, req: &SearchRequest) -> Result<SearchResults> {
    let info = match svc.get_collection(&req.collection).await? {
        Some(info) => info,
        None => bail!("Collection '{}' not found.", req.collection),
    };
    let req = SearchRequest {
        collection: info.name,
        ..req.clone()
    };
    tracing::info!("Searching...");
    let hits: Vec<SearchHit> = svc
        .search(&req)
        .await?
        .into_iter()
        .map(SearchHit::from)
        .collect();
    tracing::info!("Done. {} hits", hits.len());
    Ok(SearchResults {
        mode: req.mode,
        query: req.query.clone(),
        collection: req.collection.clone(),
        limit: req.limit,
        alpha: req.alpha,
        target_vector: req.target_vector.clone(),
        object_count: hits.len(),
        objects: hits,
    })
}

pub fn render(results: &SearchResults) -> String {
    let mut out = format!("## {}\n\n", results.mode.title());
    out.push_str(&format!("**Query:** {}\n", results.query));
    out.push_str(&format!("**Collection:** {}\n", results.collection));
    if let Some(alpha) = results.alpha {
        out.push_str(&format!("**Alpha:** {} (1=vector, 0=keyword)\n", alpha));
    }
    out.push_str(&format!("**Found:** {} objects\n\n", results.object_count));

    if results.objects.is_empty() {
        out.push_str("No objects found matching the query.\n");
        return out;
    }

    let mut keys: Vec<&String> = results
        .objects
        .iter()
        .flat_map(|o| o.properties.keys())
        .collect();
    keys.sort();
    keys.dedup();

    let semantic = results.mode == SearchMode::Semantic;
    let mut headers = vec![
        "#".to_string(),
        "UUID".to_string(),
        if semantic { "Distance" } else { "Score" }.to_string(),
    ];
    headers.extend(keys.iter().map(|k| k.to_string()));

    let rows: Vec<Vec<String>> = results
        .objects
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut row = vec![
                (i + 1).to_string(),
                hit.uuid.clone(),
                score(if semantic { hit.distance } else { hit.score }),
            ];
            for k in &keys {
                row.push(match hit.properties.get(*k) {
                    Some(v) => cell(v, false),
                    None => "-".to_string(),
                });
            }
            row
        })
        .collect();
    out.push_str(&markdown_table(&headers, &rows));
    out
}

pub async fn run_search(config: &Config, args: &SearchArgs, json: bool) -> Result<()> {
    let req = build_request(args, config)?;
    let client = WeaviateClient::new(config)?;
    let results = search(&client, &req).await?;
    if json || config.output.prefers_json() {
        print_json(&results)
    } else {
        print!("{}", render(&results));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weaviate_skills_core::schema::CollectionDefinition;
    use weaviate_skills_core::service::memory::InMemoryService;

    fn args(mode: SearchMode, query: &str) -> SearchArgs {
        SearchArgs {
            mode,
            query: query.into(),
            collection: "Article".into(),
            limit: None,
            properties: None,
            alpha: None,
            distance: None,
            target_vector: None,
            filters: None,
        }
    }

    #[test]
    fn test_build_request_defaults() {
        let cfg = Config::minimal();
        let req = build_request(&args(SearchMode::Hybrid, "solar"), &cfg).unwrap();
        assert_eq!(req.alpha, Some(0.7));
        assert_eq!(req.limit, 10);

        let mut a = args(SearchMode::Keyword, "solar");
        a.alpha = Some(0.2);
        a.target_vector = Some("v".into());
        a.properties = Some("title, body".into());
        let req = build_request(&a, &cfg).unwrap();
        assert_eq!(req.alpha, None);
        assert_eq!(req.target_vector, None);
        assert_eq!(req.query_properties, Some(vec!["title".into(), "body".into()]));
    }

    #[test]
    fn test_build_request_rejects() {
        let cfg = Config::minimal();
        assert!(build_request(&args(SearchMode::Keyword, "  "), &cfg).is_err());
        let mut a = args(SearchMode::Hybrid, "q");
        a.alpha = Some(2.0);
        assert!(build_request(&a, &cfg).is_err());
        let mut a = args(SearchMode::Keyword, "q");
        a.filters = Some(r#"{"operator":"and","filters":[]}"#.into());
        assert!(build_request(&a, &cfg).is_err());
    }

    #[test]
    fn test_build_request_rejects_non_finite_numbers() {
        let cfg = Config::minimal();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut a = args(SearchMode::Semantic, "q");
            a.distance = Some(bad);
            let err = build_request(&a, &cfg).unwrap_err();
            assert!(err.to_string().contains("--distance"), "{}", err);

            let mut a = args(SearchMode::Hybrid, "q");
            a.alpha = Some(bad);
            let err = build_request(&a, &cfg).unwrap_err();
            assert!(err.to_string().contains("--alpha"), "{}", err);
        }
        let mut a = args(SearchMode::Semantic, "q");
        a.distance = Some(0.25);
        assert_eq!(build_request(&a, &cfg).unwrap().distance, Some(0.25));
    }

    #[tokio::test]
    async fn test_keyword_search_render() {
        let svc = InMemoryService::new();
        svc.create_collection(&CollectionDefinition {
            name: "Article".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let records = vec![
            json!({"title": "Solar power"}).as_object().cloned().unwrap(),
            json!({"title": "Tides"}).as_object().cloned().unwrap(),
        ];
        svc.insert_objects("Article", None, &records).await.unwrap();

        let req = build_request(&args(SearchMode::Keyword, "solar"), &Config::minimal()).unwrap();
        let results = search(&svc, &req).await.unwrap();
        assert_eq!(results.object_count, 1);
        let md = render(&results);
        assert!(md.starts_with("## Keyword Search Results\n"));
        assert!(md.contains("**Found:** 1 objects"));
        assert!(md.contains("| # | UUID | Score | title |"));
        assert!(md.contains("| 1.0000 | Solar power |"));
    }

    #[tokio::test]
    async fn test_search_uses_stored_collection_name() {
        let svc = InMemoryService::new();
        svc.create_collection(&CollectionDefinition {
            name: "Article".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let records = vec![json!({"title": "Solar"}).as_object().cloned().unwrap()];
        svc.insert_objects("Article", None, &records).await.unwrap();

        let mut a = args(SearchMode::Keyword, "solar");
        a.collection = "article".into();
        let req = build_request(&a, &Config::minimal()).unwrap();
        let results = search(&svc, &req).await.unwrap();
        assert_eq!(results.collection, "Article");
        assert_eq!(results.object_count, 1);
    }

    #[tokio::test]
    async fn test_search_missing_collection() {
        let svc = InMemoryService::new();
        let req = build_request(&args(SearchMode::Keyword, "x"), &Config::minimal()).unwrap();
        assert!(search(&svc, &req).await.is_err());
    }
}
