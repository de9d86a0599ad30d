//! Collection definitions for `collections create`.
//!
//! Property definitions arrive as JSON:
//!
//! ```json
//! [
//!   {"name": "title", "data_type": "text", "tokenization": "word"},
//!   {"name": "price", "data_type": "number"},
//!   {"name": "author", "data_type": "object",
//!    "nested_properties": [{"name": "name", "data_type": "text"}]}
//! ]
//! ```
//!
//! [`CollectionDefinition::to_class_json`] produces the body the service
//! expects on `POST /v1/schema`.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::{CollectionInfo, MultiTenancyConfig, PropertyInfo, ReplicationConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("properties must be a JSON array of property definitions")]
    NotAList,

    #[error("property #{0} must have a 'name' field")]
    MissingName(usize),

    #[error("property '{0}' must have a 'data_type' field")]
    MissingDataType(String),

    #[error("invalid data_type '{found}' for property '{name}'. Supported types: {supported}")]
    InvalidDataType {
        name: String,
        found: String,
        supported: String,
    },

    #[error("invalid tokenization '{found}' for property '{name}'. Supported: word, lowercase, whitespace, field")]
    InvalidTokenization { name: String, found: String },

    #[error("nested_properties can only be used with 'object' or 'object[]' data types (property '{name}' has type '{data_type}')")]
    NestedOnNonObject { name: String, data_type: String },

    #[error("unknown vectorizer '{0}'. Options: {1}")]
    UnknownVectorizer(String, String),

    #[error("--auto-tenant-creation requires --multi-tenancy to be enabled")]
    AutoTenantWithoutMultiTenancy,

    #[error("collection name must not be empty")]
    EmptyName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    TextArray,
    Boolean,
    BooleanArray,
    Int,
    IntArray,
    Number,
    NumberArray,
    Date,
    DateArray,
    Uuid,
    UuidArray,
    GeoCoordinates,
    PhoneNumber,
    Blob,
    Object,
    ObjectArray,
}

impl DataType {
    const ALL: [DataType; 17] = [
        DataType::Text,
        DataType::TextArray,
        DataType::Boolean,
        DataType::BooleanArray,
        DataType::Int,
        DataType::IntArray,
        DataType::Number,
        DataType::NumberArray,
        DataType::Date,
        DataType::DateArray,
        DataType::Uuid,
        DataType::UuidArray,
        DataType::GeoCoordinates,
        DataType::PhoneNumber,
        DataType::Blob,
        DataType::Object,
        DataType::ObjectArray,
    ];

    /// Parse a data type name, ignoring case. `bool`/`bool[]` are accepted
    /// as aliases of `boolean`/`boolean[]`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bool" => Some(DataType::Boolean),
            "bool[]" => Some(DataType::BooleanArray),
            lower => Self::ALL
                .iter()
                .copied()
                .find(|dt| dt.as_str().eq_ignore_ascii_case(lower)),
        }
    }

    /// Name as the service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::TextArray => "text[]",
            DataType::Boolean => "boolean",
            DataType::BooleanArray => "boolean[]",
            DataType::Int => "int",
            DataType::IntArray => "int[]",
            DataType::Number => "number",
            DataType::NumberArray => "number[]",
            DataType::Date => "date",
            DataType::DateArray => "date[]",
            DataType::Uuid => "uuid",
            DataType::UuidArray => "uuid[]",
            DataType::GeoCoordinates => "geoCoordinates",
            DataType::PhoneNumber => "phoneNumber",
            DataType::Blob => "blob",
            DataType::Object => "object",
            DataType::ObjectArray => "object[]",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, DataType::Object | DataType::ObjectArray)
    }

    fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|dt| dt.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tokenization {
    Word,
    Lowercase,
    Whitespace,
    Field,
}

impl Tokenization {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "word" => Some(Tokenization::Word),
            "lowercase" => Some(Tokenization::Lowercase),
            "whitespace" => Some(Tokenization::Whitespace),
            "field" => Some(Tokenization::Field),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tokenization::Word => "word",
            Tokenization::Lowercase => "lowercase",
            Tokenization::Whitespace => "whitespace",
            Tokenization::Field => "field",
        }
    }
}

/// Vectorizer names accepted by `--vectorizer`.
pub const VECTORIZERS: &[&str] = &[
    "text2vec_openai",
    "text2vec_cohere",
    "text2vec_huggingface",
    "text2vec_palm",
    "text2vec_jinaai",
    "text2vec_voyageai",
    "text2vec_contextionary",
    "text2vec_transformers",
    "text2vec_gpt4all",
    "text2vec_ollama",
    "multi2vec_clip",
    "multi2vec_bind",
    "multi2vec_palm",
    "img2vec_neural",
    "ref2vec_centroid",
    "none",
];

/// Module name the service uses for a vectorizer (`text2vec_openai` → `text2vec-openai`).
pub fn vectorizer_module(name: &str) -> Result<String, SchemaError> {
    if !VECTORIZERS.contains(&name) {
        return Err(SchemaError::UnknownVectorizer(
            name.to_string(),
            VECTORIZERS.join(", "),
        ));
    }
    Ok(name.replace('_', "-"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    pub name: String,
    pub data_type: DataType,
    pub description: Option<String>,
    pub tokenization: Option<Tokenization>,
    pub nested_properties: Vec<PropertyDefinition>,
}

impl PropertyDefinition {
    fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), json!(self.name));
        obj.insert("dataType".into(), json!([self.data_type.as_str()]));
        if let Some(desc) = &self.description {
            obj.insert("description".into(), json!(desc));
        }
        if let Some(tok) = self.tokenization {
            obj.insert("tokenization".into(), json!(tok.as_str()));
        }
        if !self.nested_properties.is_empty() {
            obj.insert(
                "nestedProperties".into(),
                Value::Array(self.nested_properties.iter().map(|p| p.to_json()).collect()),
            );
        }
        Value::Object(obj)
    }

    fn to_info(&self) -> PropertyInfo {
        PropertyInfo {
            name: self.name.clone(),
            data_type: vec![self.data_type.as_str().to_string()],
            description: self.description.clone(),
            tokenization: self.tokenization.map(|t| t.as_str().to_string()),
            nested_properties: self.nested_properties.iter().map(|p| p.to_info()).collect(),
        }
    }
}

/// Parse a JSON array of property definitions.
pub fn parse_properties(value: &Value) -> Result<Vec<PropertyDefinition>, SchemaError> {
    let items = value.as_array().ok_or(SchemaError::NotAList)?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_property(item, i))
        .collect()
}

fn parse_property(value: &Value, index: usize) -> Result<PropertyDefinition, SchemaError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(SchemaError::MissingName(index))?
        .to_string();

    let raw_type = value
        .get("data_type")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::MissingDataType(name.clone()))?;
    let data_type = DataType::parse(raw_type).ok_or_else(|| SchemaError::InvalidDataType {
        name: name.clone(),
        found: raw_type.to_string(),
        supported: DataType::supported_list(),
    })?;

    let tokenization = match value.get("tokenization").and_then(Value::as_str) {
        Some(raw) => Some(Tokenization::parse(raw).ok_or_else(|| {
            SchemaError::InvalidTokenization {
                name: name.clone(),
                found: raw.to_string(),
            }
        })?),
        None => None,
    };

    let nested_properties = match value.get("nested_properties") {
        Some(nested) => {
            if !data_type.is_object() {
                return Err(SchemaError::NestedOnNonObject {
                    name,
                    data_type: data_type.as_str().to_string(),
                });
            }
            parse_properties(nested)?
        }
        None => Vec::new(),
    };

    Ok(PropertyDefinition {
        name,
        data_type,
        description: value
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        tokenization,
        nested_properties,
    })
}

/// Everything needed to create a collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionDefinition {
    pub name: String,
    pub description: Option<String>,
    pub properties: Vec<PropertyDefinition>,
    pub vectorizer: Option<String>,
    pub replication_factor: Option<u32>,
    pub multi_tenancy: bool,
    pub auto_tenant_creation: bool,
}

/// Upper-case the first letter of a collection name.
///
/// Returns the normalized name and whether it changed. Collection names are
/// GraphQL type names and must start with a capital letter.
pub fn normalize_collection_name(name: &str) -> (String, bool) {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => {
            let fixed: String = first.to_uppercase().chain(chars).collect();
            (fixed, true)
        }
        _ => (name.to_string(), false),
    }
}

impl CollectionDefinition {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if self.auto_tenant_creation && !self.multi_tenancy {
            return Err(SchemaError::AutoTenantWithoutMultiTenancy);
        }
        if let Some(v) = &self.vectorizer {
            vectorizer_module(v)?;
        }
        Ok(())
    }

    /// Request body for `POST /v1/schema`.
    pub fn to_class_json(&self) -> Result<Value, SchemaError> {
        self.validate()?;
        let mut obj = Map::new();
        obj.insert("class".into(), json!(self.name));
        if let Some(desc) = &self.description {
            obj.insert("description".into(), json!(desc));
        }
        if let Some(v) = &self.vectorizer {
            obj.insert("vectorizer".into(), json!(vectorizer_module(v)?));
        }
        obj.insert(
            "properties".into(),
            Value::Array(self.properties.iter().map(|p| p.to_json()).collect()),
        );
        if let Some(factor) = self.replication_factor {
            obj.insert("replicationConfig".into(), json!({ "factor": factor }));
        }
        if self.multi_tenancy {
            obj.insert(
                "multiTenancyConfig".into(),
                json!({
                    "enabled": true,
                    "autoTenantCreation": self.auto_tenant_creation,
                }),
            );
        }
        Ok(Value::Object(obj))
    }

    /// The collection as it will be described once created.
    pub fn to_info(&self) -> CollectionInfo {
        CollectionInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            properties: self.properties.iter().map(|p| p.to_info()).collect(),
            vectorizer: self
                .vectorizer
                .as_deref()
                .and_then(|v| vectorizer_module(v).ok()),
            module_config: None,
            replication_config: self.replication_factor.map(|factor| ReplicationConfig {
                factor: Some(factor),
            }),
            multi_tenancy_config: self.multi_tenancy.then(|| MultiTenancyConfig {
                enabled: true,
                auto_tenant_creation: self.auto_tenant_creation,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties_with_nested_object() {
        let props = parse_properties(&json!([
            {"name": "title", "data_type": "TEXT", "tokenization": "Word"},
            {"name": "in_stock", "data_type": "bool"},
            {"name": "location", "data_type": "geocoordinates"},
            {"name": "author", "data_type": "object", "nested_properties": [
                {"name": "name", "data_type": "text"}
            ]}
        ]))
        .unwrap();
        assert_eq!(props[0].data_type, DataType::Text);
        assert_eq!(props[0].tokenization, Some(Tokenization::Word));
        assert_eq!(props[1].data_type, DataType::Boolean);
        assert_eq!(props[2].data_type, DataType::GeoCoordinates);
        assert_eq!(props[3].nested_properties.len(), 1);
    }

    #[test]
    fn test_parse_property_errors() {
        assert_eq!(parse_properties(&json!({"name": "x"})), Err(SchemaError::NotAList));
        assert_eq!(
            parse_properties(&json!([{"data_type": "text"}])),
            Err(SchemaError::MissingName(0))
        );
        assert_eq!(
            parse_properties(&json!([{"name": "x"}])),
            Err(SchemaError::MissingDataType("x".into()))
        );
        assert!(matches!(
            parse_properties(&json!([{"name": "x", "data_type": "varchar"}])),
            Err(SchemaError::InvalidDataType { .. })
        ));
        assert!(matches!(
            parse_properties(&json!([{"name": "x", "data_type": "text", "tokenization": "ngram"}])),
            Err(SchemaError::InvalidTokenization { .. })
        ));
        assert!(matches!(
            parse_properties(&json!([{"name": "x", "data_type": "text", "nested_properties": []}])),
            Err(SchemaError::NestedOnNonObject { .. })
        ));
    }

    #[test]
    fn test_normalize_collection_name() {
        assert_eq!(normalize_collection_name("article"), ("Article".into(), true));
        assert_eq!(normalize_collection_name("myArticle"), ("MyArticle".into(), true));
        assert_eq!(normalize_collection_name("Article"), ("Article".into(), false));
    }

    #[test]
    fn test_class_json() {
        let def = CollectionDefinition {
            name: "Product".into(),
            description: Some("Catalog".into()),
            properties: parse_properties(&json!([{"name": "tags", "data_type": "text[]"}])).unwrap(),
            vectorizer: Some("text2vec_openai".into()),
            replication_factor: Some(2),
            multi_tenancy: true,
            auto_tenant_creation: true,
        };
        assert_eq!(
            def.to_class_json().unwrap(),
            json!({
                "class": "Product",
                "description": "Catalog",
                "vectorizer": "text2vec-openai",
                "properties": [{"name": "tags", "dataType": ["text[]"]}],
                "replicationConfig": {"factor": 2},
                "multiTenancyConfig": {"enabled": true, "autoTenantCreation": true}
            })
        );
    }

    #[test]
    fn test_validation() {
        let def = CollectionDefinition {
            name: "X".into(),
            auto_tenant_creation: true,
            ..Default::default()
        };
        assert_eq!(def.validate(), Err(SchemaError::AutoTenantWithoutMultiTenancy));

        let def = CollectionDefinition {
            name: "X".into(),
            vectorizer: Some("word2vec".into()),
            ..Default::default()
        };
        assert!(matches!(def.validate(), Err(SchemaError::UnknownVectorizer(..))));
    }
}
