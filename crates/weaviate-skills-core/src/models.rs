//! Data types exchanged with the query service.
//!
//! [`CollectionInfo`] and [`PropertyInfo`] deserialize directly from the
//! service's schema JSON (`GET /v1/schema`). [`DataObject`] is the
//! normalized shape of a fetched or searched object. [`CollectionAggregate`]
//! holds the object count and per-property statistics of a collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::PropertyCatalog;

/// One stored object: its UUID, property values, and query metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    pub uuid: String,
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub metadata: ObjectMetadata,
}

/// Per-object metadata returned by the service.
///
/// Which fields are populated depends on the query: fetches carry the
/// creation time, keyword/hybrid searches a score, semantic searches a
/// distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Creation time in milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time_unix: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain_score: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// A property as described by the collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    pub name: String,
    /// Service data type, e.g. `["text"]` or `["number[]"]`. Cross-references
    /// hold the target class name instead.
    #[serde(default)]
    pub data_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenization: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_properties: Vec<PropertyInfo>,
}

impl PropertyInfo {
    /// The primary data type name, or `"unknown"`.
    pub fn data_type_name(&self) -> &str {
        self.data_type.first().map(String::as_str).unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    #[serde(default)]
    pub factor: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTenancyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auto_tenant_creation: bool,
}

/// A collection ("class") definition as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    #[serde(rename = "class")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyInfo>,
    #[serde(default)]
    pub vectorizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_config: Option<Value>,
    #[serde(default)]
    pub replication_config: Option<ReplicationConfig>,
    #[serde(default)]
    pub multi_tenancy_config: Option<MultiTenancyConfig>,
}

impl CollectionInfo {
    pub fn is_multi_tenant(&self) -> bool {
        self.multi_tenancy_config
            .as_ref()
            .map(|c| c.enabled)
            .unwrap_or(false)
    }

    pub fn replication_factor(&self) -> Option<u32> {
        self.replication_config.as_ref().and_then(|c| c.factor)
    }

    /// Model configured for the collection's vectorizer module, if any.
    pub fn vectorizer_model(&self) -> Option<&str> {
        let vectorizer = self.vectorizer.as_deref()?;
        self.module_config
            .as_ref()?
            .get(vectorizer)?
            .get("model")?
            .as_str()
    }

    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }
}

impl PropertyCatalog for CollectionInfo {
    fn property_exists(&self, name: &str) -> bool {
        self.property(name).is_some()
    }
}

/// The family of aggregate statistics a property supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Text,
    Int,
    Number,
    Boolean,
    Date,
}

impl MetricKind {
    /// `None` for types without aggregate statistics (blobs, geo
    /// coordinates, objects, cross-references).
    pub fn for_data_type(data_type: &str) -> Option<Self> {
        match data_type.trim_end_matches("[]") {
            "text" | "string" => Some(MetricKind::Text),
            "int" => Some(MetricKind::Int),
            "number" => Some(MetricKind::Number),
            "boolean" => Some(MetricKind::Boolean),
            "date" => Some(MetricKind::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopOccurrence {
    pub value: String,
    pub count: u64,
}

/// Statistics for one property. Which fields are set depends on its
/// [`MetricKind`]; `minimum`, `maximum`, `median` and `mode` are numbers for
/// numeric properties and RFC 3339 strings for dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_true: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_false: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_true: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_false: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_occurrences: Vec<TopOccurrence>,
}

impl PropertyMetrics {
    /// Scalar statistics in display order, skipping unset ones.
    pub fn scalar_fields(&self) -> Vec<(&'static str, Value)> {
        let numbers = [
            ("count", self.count.map(Value::from)),
            ("minimum", self.minimum.clone()),
            ("maximum", self.maximum.clone()),
            ("mean", self.mean.map(Value::from)),
            ("median", self.median.clone()),
            ("mode", self.mode.clone()),
            ("sum", self.sum.map(Value::from)),
            ("total_true", self.total_true.map(Value::from)),
            ("total_false", self.total_false.map(Value::from)),
            ("percentage_true", self.percentage_true.map(Value::from)),
            ("percentage_false", self.percentage_false.map(Value::from)),
        ];
        numbers
            .into_iter()
            .filter_map(|(name, v)| v.filter(|v| !v.is_null()).map(|v| (name, v)))
            .collect()
    }
}

/// Whole-collection aggregate: object count plus per-property statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionAggregate {
    pub total_count: u64,
    pub properties: BTreeMap<String, PropertyMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_info_from_schema_json() {
        let info: CollectionInfo = serde_json::from_value(json!({
            "class": "JeopardyQuestion",
            "description": "Trivia",
            "vectorizer": "text2vec-openai",
            "moduleConfig": {"text2vec-openai": {"model": "text-embedding-3-small"}},
            "properties": [
                {"name": "question", "dataType": ["text"], "tokenization": "word"},
                {"name": "points", "dataType": ["int"]}
            ],
            "replicationConfig": {"factor": 3},
            "multiTenancyConfig": {"enabled": true, "autoTenantCreation": false}
        }))
        .unwrap();

        assert_eq!(info.name, "JeopardyQuestion");
        assert_eq!(info.vectorizer_model(), Some("text-embedding-3-small"));
        assert_eq!(info.replication_factor(), Some(3));
        assert!(info.is_multi_tenant());
        assert_eq!(info.properties[1].data_type_name(), "int");
        assert!(info.property_exists("question"));
        assert!(!info.property_exists("Question"));
    }

    #[test]
    fn test_minimal_schema_json() {
        let info: CollectionInfo = serde_json::from_value(json!({"class": "Empty"})).unwrap();
        assert!(info.properties.is_empty());
        assert!(!info.is_multi_tenant());
        assert_eq!(info.vectorizer_model(), None);
    }

    #[test]
    fn test_metric_kind_for_data_type() {
        assert_eq!(MetricKind::for_data_type("text[]"), Some(MetricKind::Text));
        assert_eq!(MetricKind::for_data_type("int"), Some(MetricKind::Int));
        assert_eq!(MetricKind::for_data_type("date"), Some(MetricKind::Date));
        assert_eq!(MetricKind::for_data_type("geoCoordinates"), None);
        assert_eq!(MetricKind::for_data_type("Person"), None);
    }

    #[test]
    fn test_scalar_fields_order() {
        let m = PropertyMetrics {
            count: Some(2),
            sum: Some(3.0),
            minimum: Some(json!(1)),
            median: Some(Value::Null),
            ..Default::default()
        };
        let names: Vec<&str> = m.scalar_fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["count", "minimum", "sum"]);
    }
}
