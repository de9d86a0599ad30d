//! Filter parser and validator.
//!
//! Converts untrusted JSON into a [`FilterExpr`]. Three input shapes are
//! accepted at the root:
//!
//! ```text
//! {"property": "round", "operator": "equal", "value": "Double Jeopardy!"}
//! {"operator": "or", "filters": [ ... ]}
//! [ {...}, {...} ]          // implicit AND
//! ```
//!
//! `null` means "no filter" and parses to `None`. Validation is eager: the
//! first problem found aborts the parse and is reported with its location in
//! the input, e.g. `$.filters[1].value`.

use serde_json::{Map, Value};
use thiserror::Error;

use super::ast::{Combinator, FilterExpr, FilterValue, Operator, Scalar, ScalarKind, ValueShape};

/// Optional schema hook consulted for every comparison's property name.
///
/// Implemented by [`CollectionInfo`](crate::models::CollectionInfo) so callers
/// can reject filters on properties a collection does not have.
pub trait PropertyCatalog {
    fn property_exists(&self, name: &str) -> bool;
}

/// A rejected filter, with the JSON path of the offending sub-structure.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid filter at {path}: {kind}")]
pub struct ParseError {
    pub path: String,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("malformed JSON ({0})")]
    InvalidJson(String),

    #[error("unknown or missing operator {}", describe_found(.0))]
    UnknownOperator(Option<String>),

    #[error("comparison requires a non-empty string 'property'")]
    MissingProperty,

    #[error("operator '{operator}' requires {expected}")]
    InvalidValueType {
        operator: Operator,
        expected: &'static str,
    },

    #[error("combinator requires a non-empty 'filters' list")]
    EmptyCombinator,

    #[error("expected {0}")]
    InvalidShape(&'static str),

    #[error("property '{0}' does not exist in the collection")]
    UnknownProperty(String),
}

fn describe_found(found: &Option<String>) -> String {
    match found {
        Some(op) => format!("'{}'", op),
        None => "(none given)".to_string(),
    }
}

/// Parse a filter value.
///
/// Returns `Ok(None)` for JSON `null`.
pub fn parse_filter(input: &Value) -> Result<Option<FilterExpr>, ParseError> {
    Parser { catalog: None }.parse_root(input)
}

/// Parse a filter value, rejecting property names unknown to `catalog`.
pub fn parse_filter_with_catalog(
    input: &Value,
    catalog: &dyn PropertyCatalog,
) -> Result<Option<FilterExpr>, ParseError> {
    Parser {
        catalog: Some(catalog),
    }
    .parse_root(input)
}

/// Parse filter JSON text. Blank text means no filter.
pub fn parse_filter_str(text: &str) -> Result<Option<FilterExpr>, ParseError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(text).map_err(|e| ParseError {
        path: "$".to_string(),
        kind: ParseErrorKind::InvalidJson(e.to_string()),
    })?;
    parse_filter(&value)
}

struct Parser<'a> {
    catalog: Option<&'a dyn PropertyCatalog>,
}

fn fail<T>(path: &str, kind: ParseErrorKind) -> Result<T, ParseError> {
    Err(ParseError {
        path: path.to_string(),
        kind,
    })
}

impl Parser<'_> {
    fn parse_root(&self, input: &Value) -> Result<Option<FilterExpr>, ParseError> {
        match input {
            Value::Null => Ok(None),
            other => self.parse_node(other, "$").map(Some),
        }
    }

    fn parse_node(&self, value: &Value, path: &str) -> Result<FilterExpr, ParseError> {
        match value {
            Value::Object(obj) => self.parse_object(obj, path),
            Value::Array(items) => Ok(FilterExpr::Combinator {
                operator: Combinator::And,
                children: self.parse_list(items, path)?,
            }),
            _ => fail(
                path,
                ParseErrorKind::InvalidShape("a filter object or a list of filters"),
            ),
        }
    }

    fn parse_list(&self, items: &[Value], path: &str) -> Result<Vec<FilterExpr>, ParseError> {
        if items.is_empty() {
            return fail(path, ParseErrorKind::EmptyCombinator);
        }
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.parse_node(item, &format!("{}[{}]", path, i)))
            .collect()
    }

    fn parse_object(&self, obj: &Map<String, Value>, path: &str) -> Result<FilterExpr, ParseError> {
        let op_path = format!("{}.operator", path);
        let keyword = match obj.get("operator") {
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return fail(
                    &op_path,
                    ParseErrorKind::UnknownOperator(Some(other.to_string())),
                )
            }
            None => return fail(&op_path, ParseErrorKind::UnknownOperator(None)),
        };

        if let Some(combinator) = Combinator::from_keyword(keyword) {
            return self.parse_combinator(combinator, obj, path);
        }

        let operator = match Operator::from_keyword(keyword) {
            Some(op) => op,
            None => {
                return fail(
                    &op_path,
                    ParseErrorKind::UnknownOperator(Some(keyword.to_string())),
                )
            }
        };

        let prop_path = format!("{}.property", path);
        let property = match obj.get("property") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return fail(&prop_path, ParseErrorKind::MissingProperty),
        };
        if let Some(catalog) = self.catalog {
            if !catalog.property_exists(&property) {
                return fail(&prop_path, ParseErrorKind::UnknownProperty(property));
            }
        }

        let value = parse_value(operator, obj.get("value"), &format!("{}.value", path))?;

        Ok(FilterExpr::Comparison {
            property,
            operator,
            value,
        })
    }

    fn parse_combinator(
        &self,
        operator: Combinator,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Result<FilterExpr, ParseError> {
        let filters_path = format!("{}.filters", path);
        let children = match obj.get("filters") {
            None | Some(Value::Null) => return fail(&filters_path, ParseErrorKind::EmptyCombinator),
            Some(Value::Array(items)) => self.parse_list(items, &filters_path)?,
            Some(_) => {
                return fail(
                    &filters_path,
                    ParseErrorKind::InvalidShape("'filters' to be a list of filters"),
                )
            }
        };
        Ok(FilterExpr::Combinator { operator, children })
    }
}

fn parse_value(
    operator: Operator,
    raw: Option<&Value>,
    path: &str,
) -> Result<FilterValue, ParseError> {
    let mismatch = |expected: &'static str| {
        fail::<FilterValue>(
            path,
            ParseErrorKind::InvalidValueType { operator, expected },
        )
    };

    let raw = match raw {
        Some(v) => v,
        None => return mismatch(expected_for(operator.value_shape())),
    };

    match operator.value_shape() {
        ValueShape::Scalar => match Scalar::from_json(raw) {
            Some(s) => Ok(FilterValue::Scalar(s)),
            None => mismatch("a string, number, or boolean value"),
        },
        ValueShape::Text => match raw {
            Value::String(s) => Ok(FilterValue::Scalar(Scalar::Text(s.clone()))),
            _ => mismatch("a string pattern"),
        },
        ValueShape::Boolean => match raw {
            Value::Bool(b) => Ok(FilterValue::Scalar(Scalar::Bool(*b))),
            _ => mismatch("a boolean value"),
        },
        ValueShape::List => {
            let items = match raw {
                Value::Array(items) if !items.is_empty() => items,
                _ => return mismatch("a non-empty list of values"),
            };
            let scalars: Option<Vec<Scalar>> = items.iter().map(Scalar::from_json).collect();
            match scalars.and_then(unify_list) {
                Some(list) => Ok(FilterValue::List(list)),
                None => mismatch("a list of strings, numbers, or booleans of one type"),
            }
        }
    }
}

fn expected_for(shape: ValueShape) -> &'static str {
    match shape {
        ValueShape::Scalar => "a string, number, or boolean value",
        ValueShape::Text => "a string pattern",
        ValueShape::Boolean => "a boolean value",
        ValueShape::List => "a non-empty list of values",
    }
}

/// Check a list holds one scalar kind. Mixed integer/float lists widen to floats.
fn unify_list(items: Vec<Scalar>) -> Option<Vec<Scalar>> {
    let first = items.first()?.kind();
    if items.iter().all(|s| s.kind() == first) {
        return Some(items);
    }
    let numeric = |k: ScalarKind| matches!(k, ScalarKind::Int | ScalarKind::Number);
    if items.iter().all(|s| numeric(s.kind())) {
        return items.iter().map(|s| s.as_f64().map(Scalar::Number)).collect();
    }
    None
}
