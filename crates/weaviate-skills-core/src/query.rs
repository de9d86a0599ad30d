//! Fetch and search requests, and their GraphQL form.
//!
//! Both fetches and searches go through the service's `Get` query:
//!
//! ```text
//! { Get { Article(limit: 10, bm25: {query: "solar"}, where: {...}) {
//!     title body _additional { id score explainScore } } } }
//! ```
//!
//! | Mode | Search argument | `_additional` |
//! |------|-----------------|---------------|
//! | fetch | none | `id creationTimeUnix` |
//! | keyword | `bm25: {query, properties}` | `id score explainScore` |
//! | semantic | `nearText: {concepts, distance, targetVectors}` | `id distance` |
//! | hybrid | `hybrid: {query, alpha, properties, targetVectors}` | `id score explainScore` |
//!
//! Collection statistics use the `Aggregate` query instead:
//!
//! ```text
//! { Aggregate { Article { meta { count }
//!     title { count topOccurrences(limit: 5) { value occurs } } } } }
//! ```
//!
//! Collection and property names are spliced into the query text, so they
//! are checked against the GraphQL name grammar first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::filter::{translate, FilterExpr};
use crate::models::{
    CollectionAggregate, CollectionInfo, DataObject, MetricKind, ObjectMetadata, PropertyMetrics,
    TopOccurrence,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("invalid name '{0}': names must match [_A-Za-z][_0-9A-Za-z]*")]
    InvalidName(String),

    #[error("alpha must be between 0.0 and 1.0, got {0}")]
    InvalidAlpha(f64),

    #[error("unknown search mode '{0}' (expected keyword, semantic or hybrid)")]
    UnknownMode(String),

    #[error("query failed: {0}")]
    Service(String),

    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// Fetch objects from a collection, optionally filtered.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub collection: String,
    pub filter: Option<FilterExpr>,
    pub limit: usize,
    pub offset: usize,
    /// Properties to return. `None` means all primitive properties.
    pub properties: Option<Vec<String>>,
}

impl FetchRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            limit: 10,
            offset: 0,
            properties: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }

    /// Title used for result headings.
    pub fn title(&self) -> &'static str {
        match self {
            SearchMode::Keyword => "Keyword Search Results",
            SearchMode::Semantic => "Semantic Search Results",
            SearchMode::Hybrid => "Hybrid Search Results",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" | "bm25" => Ok(SearchMode::Keyword),
            "semantic" | "near_text" | "neartext" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(QueryError::UnknownMode(other.to_string())),
        }
    }
}

/// A keyword, semantic or hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub mode: SearchMode,
    pub collection: String,
    pub query: String,
    pub limit: usize,
    /// Properties the keyword part searches in (keyword and hybrid only).
    pub query_properties: Option<Vec<String>>,
    /// Vector weight for hybrid search: 1.0 is pure vector, 0.0 pure keyword.
    pub alpha: Option<f64>,
    /// Maximum vector distance (semantic only).
    pub distance: Option<f64>,
    pub target_vector: Option<String>,
    pub filter: Option<FilterExpr>,
    /// Properties to return. `None` means all primitive properties.
    pub return_properties: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn new(mode: SearchMode, collection: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            mode,
            collection: collection.into(),
            query: query.into(),
            limit: 10,
            query_properties: None,
            alpha: None,
            distance: None,
            target_vector: None,
            filter: None,
            return_properties: None,
        }
    }
}

/// Most frequent text values reported per property.
pub const TOP_OCCURRENCES_LIMIT: usize = 5;

/// Aggregate over a whole collection.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRequest {
    pub collection: String,
    /// Properties to compute statistics for. Empty means count only.
    pub metrics: Vec<(String, MetricKind)>,
}

impl AggregateRequest {
    pub fn count_only(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            metrics: Vec::new(),
        }
    }

    /// Statistics for every property whose data type supports them.
    pub fn for_collection(info: &CollectionInfo) -> Self {
        Self {
            collection: info.name.clone(),
            metrics: info
                .properties
                .iter()
                .filter_map(|p| {
                    MetricKind::for_data_type(p.data_type_name()).map(|k| (p.name.clone(), k))
                })
                .collect(),
        }
    }
}

/// Split a comma-separated property list, dropping blanks.
pub fn split_properties(raw: Option<&str>) -> Option<Vec<String>> {
    let props: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if props.is_empty() {
        None
    } else {
        Some(props)
    }
}

fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

fn check_name(name: &str) -> Result<(), QueryError> {
    if is_graphql_name(name) {
        Ok(())
    } else {
        Err(QueryError::InvalidName(name.to_string()))
    }
}

/// GraphQL selection covering every primitive property of a collection.
///
/// Geo coordinates and phone numbers expand to their sub-fields; blobs,
/// objects and cross-references are left out.
pub fn default_selection(info: &CollectionInfo) -> Vec<String> {
    info.properties
        .iter()
        .filter_map(|p| match p.data_type_name() {
            "geoCoordinates" => Some(format!("{} {{ latitude longitude }}", p.name)),
            "phoneNumber" => Some(format!("{} {{ input internationalFormatted }}", p.name)),
            "blob" | "object" | "object[]" => None,
            t if t.starts_with(|c: char| c.is_ascii_uppercase()) => None,
            _ => Some(p.name.clone()),
        })
        .collect()
}

/// Resolve the selection for a request: the explicit list when given,
/// otherwise every primitive property of `info`.
pub fn resolve_selection(
    requested: Option<&[String]>,
    info: Option<&CollectionInfo>,
) -> Result<Vec<String>, QueryError> {
    match requested {
        Some(props) => {
            for p in props {
                check_name(p)?;
            }
            Ok(props.to_vec())
        }
        None => Ok(info.map(default_selection).unwrap_or_default()),
    }
}

fn string_list(items: &[String]) -> String {
    json!(items).to_string()
}

fn get_query(collection: &str, args: &[String], selection: &[String], additional: &str) -> String {
    let args = if args.is_empty() {
        String::new()
    } else {
        format!("({})", args.join(", "))
    };
    let mut fields = selection.join(" ");
    if !fields.is_empty() {
        fields.push(' ');
    }
    format!(
        "{{ Get {{ {}{} {{ {}_additional {{ {} }} }} }} }}",
        collection, args, fields, additional
    )
}

/// GraphQL query text for a fetch.
pub fn fetch_graphql(req: &FetchRequest, selection: &[String]) -> Result<String, QueryError> {
    check_name(&req.collection)?;
    let mut args = vec![format!("limit: {}", req.limit)];
    if req.offset > 0 {
        args.push(format!("offset: {}", req.offset));
    }
    if let Some(filter) = &req.filter {
        args.push(format!("where: {}", translate(filter).to_graphql()));
    }
    Ok(get_query(
        &req.collection,
        &args,
        selection,
        "id creationTimeUnix",
    ))
}

/// GraphQL query text for a search.
pub fn search_graphql(req: &SearchRequest, selection: &[String]) -> Result<String, QueryError> {
    check_name(&req.collection)?;
    if let Some(props) = &req.query_properties {
        for p in props {
            check_name(p)?;
        }
    }
    let query = json!(req.query).to_string();
    let target = req
        .target_vector
        .as_ref()
        .map(|t| format!(", targetVectors: {}", string_list(std::slice::from_ref(t))))
        .unwrap_or_default();
    let properties = req
        .query_properties
        .as_ref()
        .map(|p| format!(", properties: {}", string_list(p)))
        .unwrap_or_default();

    let mut args = vec![format!("limit: {}", req.limit)];
    let additional = match req.mode {
        SearchMode::Keyword => {
            args.push(format!("bm25: {{query: {}{}}}", query, properties));
            "id score explainScore"
        }
        SearchMode::Semantic => {
            let distance = req
                .distance
                .map(|d| format!(", distance: {}", d))
                .unwrap_or_default();
            args.push(format!(
                "nearText: {{concepts: [{}]{}{}}}",
                query, distance, target
            ));
            "id distance"
        }
        SearchMode::Hybrid => {
            let alpha = match req.alpha {
                Some(a) if !(0.0..=1.0).contains(&a) => return Err(QueryError::InvalidAlpha(a)),
                Some(a) => format!(", alpha: {}", a),
                None => String::new(),
            };
            args.push(format!(
                "hybrid: {{query: {}{}{}{}}}",
                query, alpha, properties, target
            ));
            "id score explainScore"
        }
    };
    if let Some(filter) = &req.filter {
        args.push(format!("where: {}", translate(filter).to_graphql()));
    }
    Ok(get_query(&req.collection, &args, selection, additional))
}

fn metric_fields(kind: MetricKind) -> String {
    match kind {
        MetricKind::Text => format!(
            "count topOccurrences(limit: {}) {{ value occurs }}",
            TOP_OCCURRENCES_LIMIT
        ),
        MetricKind::Int | MetricKind::Number => {
            "count minimum maximum mean median mode sum".to_string()
        }
        MetricKind::Boolean => "count totalTrue totalFalse percentageTrue percentageFalse".to_string(),
        MetricKind::Date => "count minimum maximum median mode".to_string(),
    }
}

/// GraphQL query text for a whole-collection aggregate.
pub fn aggregate_graphql(req: &AggregateRequest) -> Result<String, QueryError> {
    check_name(&req.collection)?;
    let mut fields = vec!["meta { count }".to_string()];
    for (name, kind) in &req.metrics {
        check_name(name)?;
        fields.push(format!("{} {{ {} }}", name, metric_fields(*kind)));
    }
    Ok(format!(
        "{{ Aggregate {{ {} {{ {} }} }} }}",
        req.collection,
        fields.join(" ")
    ))
}

/// Request body for `POST /v1/graphql`.
pub fn graphql_body(query: &str) -> Value {
    json!({ "query": query })
}

fn number_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn int_field(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn decode_hit(item: &Value) -> Result<DataObject, QueryError> {
    let mut properties = item
        .as_object()
        .cloned()
        .ok_or_else(|| QueryError::Malformed("result item is not an object".into()))?;
    let additional = properties.remove("_additional").unwrap_or(Value::Null);
    let uuid = additional
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::Malformed("result item has no _additional.id".into()))?
        .to_string();
    let metadata = ObjectMetadata {
        creation_time_unix: int_field(additional.get("creationTimeUnix")),
        score: number_field(additional.get("score")),
        explain_score: additional
            .get("explainScore")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        distance: number_field(additional.get("distance")),
    };
    Ok(DataObject {
        uuid,
        properties,
        metadata,
    })
}

/// A non-empty `errors` array fails the whole query; the service reports
/// partial failures that way too.
fn check_graphql_errors(body: &Value) -> Result<(), QueryError> {
    match body.get("errors").and_then(Value::as_array) {
        Some(errors) if !errors.is_empty() => {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            Err(QueryError::Service(messages.join("; ")))
        }
        _ => Ok(()),
    }
}

/// Decode a GraphQL `Get` response into objects.
pub fn decode_get_response(collection: &str, body: &Value) -> Result<Vec<DataObject>, QueryError> {
    check_graphql_errors(body)?;
    let items = body
        .get("data")
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(collection))
        .ok_or_else(|| QueryError::Malformed(format!("missing data.Get.{}", collection)))?;
    match items {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(decode_hit).collect(),
        _ => Err(QueryError::Malformed(format!(
            "data.Get.{} is not a list",
            collection
        ))),
    }
}

fn count_field(value: Option<&Value>) -> Option<u64> {
    int_field(value).and_then(|n| u64::try_from(n).ok())
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn decode_metrics(value: &Value) -> PropertyMetrics {
    let top_occurrences = value
        .get("topOccurrences")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| TopOccurrence {
                    value: match item.get("value") {
                        Some(Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    },
                    count: count_field(item.get("occurs")).unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();
    PropertyMetrics {
        count: count_field(value.get("count")),
        minimum: present(value.get("minimum")),
        maximum: present(value.get("maximum")),
        mean: number_field(value.get("mean")),
        median: present(value.get("median")),
        mode: present(value.get("mode")),
        sum: number_field(value.get("sum")),
        total_true: count_field(value.get("totalTrue")),
        total_false: count_field(value.get("totalFalse")),
        percentage_true: number_field(value.get("percentageTrue")),
        percentage_false: number_field(value.get("percentageFalse")),
        top_occurrences,
    }
}

/// Decode a GraphQL `Aggregate` response.
///
/// Without `groupBy` the service answers with a single group; an empty or
/// `null` group list means an empty collection.
pub fn decode_aggregate_response(
    req: &AggregateRequest,
    body: &Value,
) -> Result<CollectionAggregate, QueryError> {
    check_graphql_errors(body)?;
    let groups = body
        .get("data")
        .and_then(|d| d.get("Aggregate"))
        .and_then(|a| a.get(&req.collection))
        .ok_or_else(|| QueryError::Malformed(format!("missing data.Aggregate.{}", req.collection)))?;
    let group = match groups {
        Value::Null => None,
        Value::Array(items) => items.first(),
        _ => {
            return Err(QueryError::Malformed(format!(
                "data.Aggregate.{} is not a list",
                req.collection
            )))
        }
    };
    let Some(group) = group else {
        return Ok(CollectionAggregate::default());
    };
    let total_count = count_field(group.get("meta").and_then(|m| m.get("count"))).unwrap_or(0);
    let properties = req
        .metrics
        .iter()
        .filter_map(|(name, _)| {
            let value = group.get(name).filter(|v| v.is_object())?;
            Some((name.clone(), decode_metrics(value)))
        })
        .collect();
    Ok(CollectionAggregate {
        total_count,
        properties,
    })
}

/// Decode a `GET /v1/objects/{class}/{id}` response.
pub fn decode_object_response(body: &Value) -> Result<DataObject, QueryError> {
    let uuid = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| QueryError::Malformed("object has no id".into()))?
        .to_string();
    let properties = body
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);
    Ok(DataObject {
        uuid,
        properties,
        metadata: ObjectMetadata {
            creation_time_unix: int_field(body.get("creationTimeUnix")),
            ..Default::default()
        },
    })
}

/// Keep only the named properties of an object.
pub fn project(object: &mut DataObject, properties: &[String]) {
    object.properties.retain(|k, _| properties.iter().any(|p| p == k));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;

    fn info() -> CollectionInfo {
        serde_json::from_value(json!({
            "class": "Place",
            "properties": [
                {"name": "name", "dataType": ["text"]},
                {"name": "location", "dataType": ["geoCoordinates"]},
                {"name": "phone", "dataType": ["phoneNumber"]},
                {"name": "photo", "dataType": ["blob"]},
                {"name": "owner", "dataType": ["Person"]},
                {"name": "address", "dataType": ["object"]},
                {"name": "rating", "dataType": ["number"]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_default_selection() {
        assert_eq!(
            default_selection(&info()),
            vec![
                "name",
                "location { latitude longitude }",
                "phone { input internationalFormatted }",
                "rating"
            ]
        );
    }

    #[test]
    fn test_fetch_graphql() {
        let mut req = FetchRequest::new("Article");
        req.limit = 5;
        req.offset = 10;
        req.filter = parse_filter(&json!({"property": "year", "operator": "greater_than", "value": 2000}))
            .unwrap();
        let q = fetch_graphql(&req, &["title".into(), "year".into()]).unwrap();
        assert_eq!(
            q,
            r#"{ Get { Article(limit: 5, offset: 10, where: {operator: GreaterThan, path: ["year"], valueInt: 2000}) { title year _additional { id creationTimeUnix } } } }"#
        );
    }

    #[test]
    fn test_fetch_graphql_without_selection() {
        let q = fetch_graphql(&FetchRequest::new("Empty"), &[]).unwrap();
        assert_eq!(q, "{ Get { Empty(limit: 10) { _additional { id creationTimeUnix } } } }");
    }

    #[test]
    fn test_search_graphql_modes() {
        let mut req = SearchRequest::new(SearchMode::Keyword, "Article", "solar \"panels\"");
        req.query_properties = Some(vec!["title".into()]);
        let q = search_graphql(&req, &["title".into()]).unwrap();
        assert!(q.contains(r#"bm25: {query: "solar \"panels\"", properties: ["title"]}"#), "{}", q);
        assert!(q.contains("_additional { id score explainScore }"));

        let mut req = SearchRequest::new(SearchMode::Semantic, "Article", "energy");
        req.distance = Some(0.25);
        req.target_vector = Some("title_vector".into());
        let q = search_graphql(&req, &[]).unwrap();
        assert!(
            q.contains(r#"nearText: {concepts: ["energy"], distance: 0.25, targetVectors: ["title_vector"]}"#),
            "{}",
            q
        );
        assert!(q.contains("_additional { id distance }"));

        let mut req = SearchRequest::new(SearchMode::Hybrid, "Article", "energy");
        req.alpha = Some(0.7);
        req.filter = parse_filter(&json!({"property": "lang", "operator": "equal", "value": "en"})).unwrap();
        let q = search_graphql(&req, &[]).unwrap();
        assert!(q.contains(r#"hybrid: {query: "energy", alpha: 0.7}"#), "{}", q);
        assert!(q.contains(r#"where: {operator: Equal, path: ["lang"], valueText: "en"}"#));
    }

    #[test]
    fn test_rejects_unsafe_names_and_alpha() {
        let req = FetchRequest::new("Article) { x }");
        assert!(matches!(fetch_graphql(&req, &[]), Err(QueryError::InvalidName(_))));
        assert!(resolve_selection(Some(&["ok".into(), "bad name".into()]), None).is_err());

        let mut req = SearchRequest::new(SearchMode::Hybrid, "Article", "q");
        req.alpha = Some(1.5);
        assert_eq!(search_graphql(&req, &[]), Err(QueryError::InvalidAlpha(1.5)));
    }

    #[test]
    fn test_decode_get_response() {
        let body = json!({"data": {"Get": {"Article": [
            {"title": "A", "_additional": {"id": "u1", "score": "0.75", "explainScore": "bm25"}},
            {"title": "B", "_additional": {"id": "u2", "distance": 0.12, "creationTimeUnix": "1700000000000"}}
        ]}}});
        let objs = decode_get_response("Article", &body).unwrap();
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0].metadata.score, Some(0.75));
        assert_eq!(objs[0].metadata.explain_score.as_deref(), Some("bm25"));
        assert!(!objs[0].properties.contains_key("_additional"));
        assert_eq!(objs[1].metadata.distance, Some(0.12));
        assert_eq!(objs[1].metadata.creation_time_unix, Some(1_700_000_000_000));
    }

    #[test]
    fn test_decode_errors() {
        let body = json!({"errors": [{"message": "no such class"}], "data": {"Get": {"Article": null}}});
        assert_eq!(
            decode_get_response("Article", &body),
            Err(QueryError::Service("no such class".into()))
        );
        let body = json!({"data": {"Get": {"Article": null}}});
        assert!(decode_get_response("Article", &body).unwrap().is_empty());
        assert!(matches!(
            decode_get_response("Article", &json!({})),
            Err(QueryError::Malformed(_))
        ));
    }

    #[test]
    fn test_aggregate_graphql() {
        let info: CollectionInfo = serde_json::from_value(json!({
            "class": "Product",
            "properties": [
                {"name": "name", "dataType": ["text"]},
                {"name": "price", "dataType": ["number"]},
                {"name": "in_stock", "dataType": ["boolean"]},
                {"name": "added", "dataType": ["date"]},
                {"name": "photo", "dataType": ["blob"]}
            ]
        }))
        .unwrap();
        let req = AggregateRequest::for_collection(&info);
        assert_eq!(req.metrics.len(), 4);
        assert_eq!(
            aggregate_graphql(&req).unwrap(),
            "{ Aggregate { Product { meta { count } \
             name { count topOccurrences(limit: 5) { value occurs } } \
             price { count minimum maximum mean median mode sum } \
             in_stock { count totalTrue totalFalse percentageTrue percentageFalse } \
             added { count minimum maximum median mode } } } }"
        );
        assert_eq!(
            aggregate_graphql(&AggregateRequest::count_only("Product")).unwrap(),
            "{ Aggregate { Product { meta { count } } } }"
        );
        assert!(aggregate_graphql(&AggregateRequest::count_only("Bad name")).is_err());
    }

    #[test]
    fn test_decode_aggregate_response() {
        let req = AggregateRequest {
            collection: "Product".into(),
            metrics: vec![
                ("name".into(), MetricKind::Text),
                ("price".into(), MetricKind::Number),
                ("in_stock".into(), MetricKind::Boolean),
            ],
        };
        let body = json!({"data": {"Aggregate": {"Product": [{
            "meta": {"count": 3},
            "name": {"count": 3, "topOccurrences": [{"value": "Lamp", "occurs": 2}, {"value": "Desk", "occurs": 1}]},
            "price": {"count": 3, "minimum": 40, "maximum": 60, "mean": 48.5, "median": 45.5, "mode": 40, "sum": 145.5},
            "in_stock": {"count": 3, "totalTrue": 2, "totalFalse": 1, "percentageTrue": 0.6667, "percentageFalse": 0.3333}
        }]}}});
        let agg = decode_aggregate_response(&req, &body).unwrap();
        assert_eq!(agg.total_count, 3);
        let name = &agg.properties["name"];
        assert_eq!(name.top_occurrences[0], TopOccurrence { value: "Lamp".into(), count: 2 });
        let price = &agg.properties["price"];
        assert_eq!(price.minimum, Some(json!(40)));
        assert_eq!(price.mean, Some(48.5));
        assert_eq!(price.sum, Some(145.5));
        assert_eq!(agg.properties["in_stock"].total_true, Some(2));

        let empty = json!({"data": {"Aggregate": {"Product": []}}});
        assert_eq!(decode_aggregate_response(&req, &empty).unwrap().total_count, 0);
        let err = json!({"errors": [{"message": "no such class"}]});
        assert!(matches!(
            decode_aggregate_response(&req, &err),
            Err(QueryError::Service(_))
        ));
    }

    #[test]
    fn test_split_properties_and_mode() {
        assert_eq!(
            split_properties(Some(" a, ,b ")),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(split_properties(Some(" , ")), None);
        assert_eq!("BM25".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert!("vector".parse::<SearchMode>().is_err());
    }
}
