//! HTTP client for a hosted Weaviate cluster.
//!
//! [`WeaviateClient`] implements [`QueryService`] over the REST and GraphQL
//! endpoints:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | list / get collection | `GET /v1/schema`, `GET /v1/schema/{name}` |
//! | create collection | `POST /v1/schema` |
//! | fetch / search / aggregate | `POST /v1/graphql` |
//! | fetch by id | `GET /v1/objects/{class}/{id}` |
//! | import | `POST /v1/batch/objects` |
//!
//! # Authentication
//!
//! The cluster API key is sent as `Authorization: Bearer <key>`. Provider
//! keys found in the environment (`OPENAI_API_KEY`, `COHERE_API_KEY`, ...)
//! are forwarded as the vendor headers the cluster's modules read, so
//! server-side vectorization and generation work without extra setup.
//!
//! # Retry Strategy
//!
//! - HTTP 429 or 5xx → retry with exponential backoff (1s, 2s, 4s, ... capped at 32s)
//! - HTTP 404 → "not found" (`None`) where the operation allows it
//! - Other HTTP 4xx → fail immediately with the response body
//! - Network error or timeout → retry, except for collection creation
//!
//! Batch objects get a client-side UUID before the first attempt, so a
//! batch replayed after a timeout overwrites instead of duplicating.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};

use weaviate_skills_core::filter::Record;
use weaviate_skills_core::models::{CollectionAggregate, CollectionInfo, DataObject};
use weaviate_skills_core::query::{
    aggregate_graphql, decode_aggregate_response, decode_get_response, decode_object_response,
    fetch_graphql, graphql_body, project, resolve_selection, search_graphql, AggregateRequest,
    FetchRequest, SearchRequest,
};
use weaviate_skills_core::schema::CollectionDefinition;
use weaviate_skills_core::service::{BatchError, BatchOutcome, QueryService};

use crate::config::{ClientConfig, Config};

/// Environment variables holding provider API keys, and the header each is
/// forwarded as.
pub const PROVIDER_KEYS: &[(&str, &str)] = &[
    ("ANTHROPIC_API_KEY", "X-Anthropic-Api-Key"),
    ("ANYSCALE_API_KEY", "X-Anyscale-Api-Key"),
    ("AWS_ACCESS_KEY", "X-Aws-Access-Key"),
    ("AWS_SECRET_KEY", "X-Aws-Secret-Key"),
    ("COHERE_API_KEY", "X-Cohere-Api-Key"),
    ("DATABRICKS_TOKEN", "X-Databricks-Token"),
    ("FRIENDLI_TOKEN", "X-Friendli-Api-Key"),
    ("VERTEX_API_KEY", "X-Goog-Vertex-Api-Key"),
    ("STUDIO_API_KEY", "X-Goog-Studio-Api-Key"),
    ("HUGGINGFACE_API_KEY", "X-HuggingFace-Api-Key"),
    ("JINAAI_API_KEY", "X-JinaAI-Api-Key"),
    ("MISTRAL_API_KEY", "X-Mistral-Api-Key"),
    ("NVIDIA_API_KEY", "X-Nvidia-Api-Key"),
    ("OPENAI_API_KEY", "X-OpenAI-Api-Key"),
    ("AZURE_API_KEY", "X-Azure-Api-Key"),
    ("VOYAGE_API_KEY", "X-Voyage-Api-Key"),
    ("XAI_API_KEY", "X-Xai-Api-Key"),
];

/// Collect provider headers from the environment, skipping blank values.
pub fn provider_headers() -> Vec<(String, String)> {
    PROVIDER_KEYS
        .iter()
        .filter_map(|(var, header)| {
            let value = std::env::var(var).ok()?;
            let value = value.trim();
            if value.is_empty() {
                None
            } else {
                Some((header.to_string(), value.to_string()))
            }
        })
        .collect()
}

/// Add `https://` when the URL has no scheme and drop trailing slashes.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

pub struct WeaviateClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    headers: Vec<(String, String)>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl WeaviateClient {
    /// Build a client from configuration and the environment.
    pub fn new(config: &Config) -> Result<Self> {
        let url = config.weaviate_url()?;
        let headers = if config.weaviate.forward_provider_keys {
            provider_headers()
        } else {
            Vec::new()
        };
        if !headers.is_empty() {
            let mut detected: Vec<&str> = PROVIDER_KEYS
                .iter()
                .filter(|(_, h)| headers.iter().any(|(name, _)| name == h))
                .map(|(var, _)| *var)
                .collect();
            detected.sort_unstable();
            tracing::info!("Detected providers: {}", detected.join(", "));
        }
        if config.weaviate.api_key.is_none() {
            tracing::warn!("WEAVIATE_API_KEY not set; connecting without authentication");
        }
        tracing::info!("Connecting to Weaviate at {}...", url);
        Self::build(
            url,
            config.weaviate.api_key.clone(),
            headers,
            &config.client,
        )
    }

    /// Build a client from explicit parts.
    pub fn build(
        base_url: &str,
        api_key: Option<String>,
        headers: Vec<(String, String)>,
        config: &ClientConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = normalize_base_url(base_url);
        Url::parse(&base_url).with_context(|| format!("Invalid Weaviate URL: {}", base_url))?;
        Ok(Self {
            http,
            base_url,
            api_key,
            headers,
            max_retries: config.max_retries,
            backoff_unit: Duration::from_secs(1),
        })
    }

    /// Scale the retry delays; the schedule is `unit × 2^(attempt-1)`.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid Weaviate URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request with retry/backoff.
    ///
    /// Returns `Ok(None)` on 404 and the parsed JSON body (or `Null` for an
    /// empty body) on success.
    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Option<Value>> {
        self.send_with(method, url, body, Replay::Safe).await
    }

    async fn send_with(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        replay: Replay,
    ) -> Result<Option<Value>> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_unit * (1u32 << (attempt - 1).min(5));
                tracing::warn!(
                    "retrying {} {} in {:?} (attempt {}/{})",
                    method,
                    url.path(),
                    delay,
                    attempt,
                    self.max_retries
                );
                tokio::time::sleep(delay).await;
            }

            let mut req = self.http.request(method.clone(), url.clone());
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            for (name, value) in &self.headers {
                req = req.header(name.as_str(), value.as_str());
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            tracing::debug!("{} {}", method, url);

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let text = response.text().await?;
                        if text.trim().is_empty() {
                            return Ok(Some(Value::Null));
                        }
                        let json = serde_json::from_str(&text)
                            .with_context(|| format!("Invalid JSON from {}", url.path()))?;
                        return Ok(Some(json));
                    }

                    if status == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    // Rate limited or server error; retry
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("Weaviate error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Weaviate error {}: {}", status, body_text);
                }
                Err(e) => {
                    let err = anyhow::Error::new(e).context("Connection failed");
                    // The server may have applied the request before the
                    // connection dropped.
                    if replay == Replay::Unsafe {
                        return Err(err);
                    }
                    last_err = Some(err);
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }

    async fn graphql(&self, query: &str) -> Result<Value> {
        let url = self.url(&["v1", "graphql"])?;
        self.send(Method::POST, url, Some(&graphql_body(query)))
            .await?
            .ok_or_else(|| anyhow!("GraphQL endpoint not found at {}", self.base_url))
    }

    async fn selection(&self, collection: &str, requested: Option<&[String]>) -> Result<Vec<String>> {
        if requested.is_some() {
            return Ok(resolve_selection(requested, None)?);
        }
        let info = self
            .get_collection(collection)
            .await?
            .ok_or_else(|| anyhow!("Collection '{}' not found.", collection))?;
        Ok(resolve_selection(None, Some(&info))?)
    }
}

/// Whether a request may be sent again after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    Safe,
    Unsafe,
}

fn batch_errors(response: &Value) -> Vec<BatchError> {
    let items = match response.as_array() {
        Some(items) => items,
        None => return Vec::new(),
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let errors = item
                .get("result")?
                .get("errors")?
                .get("error")?
                .as_array()?;
            if errors.is_empty() {
                return None;
            }
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            Some(BatchError { index, message })
        })
        .collect()
}

#[async_trait]
impl QueryService for WeaviateClient {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let body = self
            .send(Method::GET, self.url(&["v1", "schema"])?, None)
            .await?
            .unwrap_or(Value::Null);
        let classes = body.get("classes").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(classes).context("Invalid schema response")
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        match self
            .send(Method::GET, self.url(&["v1", "schema", name])?, None)
            .await?
        {
            Some(body) => Ok(Some(
                serde_json::from_value(body).context("Invalid collection response")?,
            )),
            None => Ok(None),
        }
    }

    async fn create_collection(&self, def: &CollectionDefinition) -> Result<CollectionInfo> {
        let class = def.to_class_json()?;
        let body = self
            .send_with(
                Method::POST,
                self.url(&["v1", "schema"])?,
                Some(&class),
                Replay::Unsafe,
            )
            .await?
            .ok_or_else(|| anyhow!("Schema endpoint not found at {}", self.base_url))?;
        if body.is_object() {
            serde_json::from_value(body).context("Invalid create-collection response")
        } else {
            Ok(def.to_info())
        }
    }

    async fn fetch_objects(&self, req: &FetchRequest) -> Result<Vec<DataObject>> {
        let selection = self
            .selection(&req.collection, req.properties.as_deref())
            .await?;
        let query = fetch_graphql(req, &selection)?;
        let body = self.graphql(&query).await?;
        Ok(decode_get_response(&req.collection, &body)?)
    }

    async fn fetch_object_by_id(
        &self,
        collection: &str,
        id: &str,
        properties: Option<&[String]>,
    ) -> Result<Option<DataObject>> {
        let url = self.url(&["v1", "objects", collection, id])?;
        let body = match self.send(Method::GET, url, None).await? {
            Some(body) => body,
            None => return Ok(None),
        };
        let mut object = decode_object_response(&body)?;
        if let Some(props) = properties {
            project(&mut object, props);
        }
        Ok(Some(object))
    }

    async fn search(&self, req: &SearchRequest) -> Result<Vec<DataObject>> {
        let selection = self
            .selection(&req.collection, req.return_properties.as_deref())
            .await?;
        let query = search_graphql(req, &selection)?;
        let body = self.graphql(&query).await?;
        Ok(decode_get_response(&req.collection, &body)?)
    }

    async fn insert_objects(
        &self,
        collection: &str,
        tenant: Option<&str>,
        records: &[Record],
    ) -> Result<BatchOutcome> {
        let objects: Vec<Value> = records
            .iter()
            .map(|r| {
                // A fixed id makes a retried batch an upsert.
                let mut obj = json!({
                    "class": collection,
                    "id": uuid::Uuid::new_v4().to_string(),
                    "properties": r,
                });
                if let Some(t) = tenant {
                    obj["tenant"] = json!(t);
                }
                obj
            })
            .collect();
        let body = self
            .send(
                Method::POST,
                self.url(&["v1", "batch", "objects"])?,
                Some(&json!({ "objects": objects })),
            )
            .await?
            .ok_or_else(|| anyhow!("Batch endpoint not found at {}", self.base_url))?;

        let errors = batch_errors(&body);
        Ok(BatchOutcome {
            inserted: records.len().saturating_sub(errors.len()),
            errors,
        })
    }

    async fn aggregate(&self, req: &AggregateRequest) -> Result<CollectionAggregate> {
        let query = aggregate_graphql(req)?;
        let body = self.graphql(&query).await?;
        Ok(decode_aggregate_response(req, &body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("my-cluster.weaviate.cloud/"),
            "https://my-cluster.weaviate.cloud"
        );
        assert_eq!(
            normalize_base_url(" http://localhost:8080// "),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_url_segments_are_escaped() {
        let client = WeaviateClient::build(
            "http://localhost:8080/base/",
            None,
            Vec::new(),
            &ClientConfig::default(),
        )
        .unwrap();
        let url = client.url(&["v1", "schema", "My Class"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/base/v1/schema/My%20Class");
    }

    #[test]
    fn test_batch_errors() {
        let body = json!([
            {"id": "a", "result": {}},
            {"id": "b", "result": {"errors": {"error": [{"message": "bad type"}, {"message": "again"}]}}},
            {"id": "c", "result": {"errors": {"error": []}}}
        ]);
        assert_eq!(
            batch_errors(&body),
            vec![BatchError {
                index: 1,
                message: "bad type; again".into()
            }]
        );
        assert!(batch_errors(&json!({})).is_empty());
    }
}
