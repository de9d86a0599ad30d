//! Translation of [`FilterExpr`] trees into the service's native `where` filter.
//!
//! Translation is total: every tree, including hand-built ones, maps to
//! exactly one [`NativeFilter`]. The mapping is structural and each operator
//! has exactly one native counterpart:
//!
//! | Filter keyword | Native operator |
//! |----------------|-----------------|
//! | `and` / `or` | `And` / `Or` |
//! | `equal` | `Equal` |
//! | `not_equal` | `NotEqual` |
//! | `less_than` | `LessThan` |
//! | `less_or_equal` | `LessThanEqual` |
//! | `greater_than` | `GreaterThan` |
//! | `greater_or_equal` | `GreaterThanEqual` |
//! | `like` | `Like` |
//! | `contains_any` | `ContainsAny` |
//! | `contains_all` | `ContainsAll` |
//! | `is_none` | `IsNull` |
//!
//! A [`NativeFilter`] serializes with serde to the REST JSON body form and
//! renders with [`NativeFilter::to_graphql`] to a GraphQL `where:` argument.

use serde::Serialize;
use serde_json::{json, Value};

use super::ast::{Combinator, FilterExpr, FilterValue, Operator, Scalar, ScalarKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NativeOperator {
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Like,
    ContainsAny,
    ContainsAll,
    IsNull,
}

impl NativeOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            NativeOperator::And => "And",
            NativeOperator::Or => "Or",
            NativeOperator::Equal => "Equal",
            NativeOperator::NotEqual => "NotEqual",
            NativeOperator::LessThan => "LessThan",
            NativeOperator::LessThanEqual => "LessThanEqual",
            NativeOperator::GreaterThan => "GreaterThan",
            NativeOperator::GreaterThanEqual => "GreaterThanEqual",
            NativeOperator::Like => "Like",
            NativeOperator::ContainsAny => "ContainsAny",
            NativeOperator::ContainsAll => "ContainsAll",
            NativeOperator::IsNull => "IsNull",
        }
    }
}

impl From<Operator> for NativeOperator {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Equal => NativeOperator::Equal,
            Operator::NotEqual => NativeOperator::NotEqual,
            Operator::LessThan => NativeOperator::LessThan,
            Operator::LessOrEqual => NativeOperator::LessThanEqual,
            Operator::GreaterThan => NativeOperator::GreaterThan,
            Operator::GreaterOrEqual => NativeOperator::GreaterThanEqual,
            Operator::Like => NativeOperator::Like,
            Operator::ContainsAny => NativeOperator::ContainsAny,
            Operator::ContainsAll => NativeOperator::ContainsAll,
            Operator::IsNone => NativeOperator::IsNull,
        }
    }
}

impl From<Combinator> for NativeOperator {
    fn from(c: Combinator) -> Self {
        match c {
            Combinator::And => NativeOperator::And,
            Combinator::Or => NativeOperator::Or,
        }
    }
}

/// Typed value slot of a native leaf filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NativeValue {
    #[serde(rename = "valueText")]
    Text(String),
    #[serde(rename = "valueInt")]
    Int(i64),
    #[serde(rename = "valueNumber")]
    Number(f64),
    #[serde(rename = "valueBoolean")]
    Boolean(bool),
    #[serde(rename = "valueTextArray")]
    TextArray(Vec<String>),
    #[serde(rename = "valueIntArray")]
    IntArray(Vec<i64>),
    #[serde(rename = "valueNumberArray")]
    NumberArray(Vec<f64>),
    #[serde(rename = "valueBooleanArray")]
    BooleanArray(Vec<bool>),
}

impl NativeValue {
    /// Field name of the slot, e.g. `valueText`.
    pub fn key(&self) -> &'static str {
        match self {
            NativeValue::Text(_) => "valueText",
            NativeValue::Int(_) => "valueInt",
            NativeValue::Number(_) => "valueNumber",
            NativeValue::Boolean(_) => "valueBoolean",
            NativeValue::TextArray(_) => "valueTextArray",
            NativeValue::IntArray(_) => "valueIntArray",
            NativeValue::NumberArray(_) => "valueNumberArray",
            NativeValue::BooleanArray(_) => "valueBooleanArray",
        }
    }

    fn literal(&self) -> Value {
        match self {
            NativeValue::Text(s) => json!(s),
            NativeValue::Int(i) => json!(i),
            NativeValue::Number(n) => json!(n),
            NativeValue::Boolean(b) => json!(b),
            NativeValue::TextArray(v) => json!(v),
            NativeValue::IntArray(v) => json!(v),
            NativeValue::NumberArray(v) => json!(v),
            NativeValue::BooleanArray(v) => json!(v),
        }
    }
}

/// The filter object accepted by the query service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NativeFilter {
    Group {
        operator: NativeOperator,
        operands: Vec<NativeFilter>,
    },
    Leaf {
        operator: NativeOperator,
        path: Vec<String>,
        #[serde(flatten)]
        value: NativeValue,
    },
}

impl NativeFilter {
    /// Render as a GraphQL input object, e.g.
    /// `{operator: Equal, path: ["round"], valueText: "Final"}`.
    ///
    /// Operators are bare enum identifiers; strings use JSON escaping, which
    /// GraphQL string literals accept.
    pub fn to_graphql(&self) -> String {
        match self {
            NativeFilter::Group { operator, operands } => {
                let inner: Vec<String> = operands.iter().map(NativeFilter::to_graphql).collect();
                format!(
                    "{{operator: {}, operands: [{}]}}",
                    operator.as_str(),
                    inner.join(", ")
                )
            }
            NativeFilter::Leaf {
                operator,
                path,
                value,
            } => format!(
                "{{operator: {}, path: {}, {}: {}}}",
                operator.as_str(),
                json!(path),
                value.key(),
                value.literal()
            ),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<&FilterExpr> for NativeFilter {
    fn from(expr: &FilterExpr) -> Self {
        translate(expr)
    }
}

/// Translate a filter tree into its native form.
pub fn translate(expr: &FilterExpr) -> NativeFilter {
    match expr {
        FilterExpr::Combinator { operator, children } => NativeFilter::Group {
            operator: (*operator).into(),
            operands: children.iter().map(translate).collect(),
        },
        FilterExpr::Comparison {
            property,
            operator,
            value,
        } => NativeFilter::Leaf {
            operator: (*operator).into(),
            path: vec![property.clone()],
            value: native_value(value),
        },
    }
}

fn native_value(value: &FilterValue) -> NativeValue {
    match value {
        FilterValue::Scalar(Scalar::Text(s)) => NativeValue::Text(s.clone()),
        FilterValue::Scalar(Scalar::Int(i)) => NativeValue::Int(*i),
        FilterValue::Scalar(Scalar::Number(n)) => NativeValue::Number(*n),
        FilterValue::Scalar(Scalar::Bool(b)) => NativeValue::Boolean(*b),
        FilterValue::List(items) => native_array(items),
    }
}

fn native_array(items: &[Scalar]) -> NativeValue {
    let all = |kind: ScalarKind| items.iter().all(|s| s.kind() == kind);
    if !items.is_empty() {
        if all(ScalarKind::Int) {
            return NativeValue::IntArray(
                items
                    .iter()
                    .filter_map(|s| match s {
                        Scalar::Int(i) => Some(*i),
                        _ => None,
                    })
                    .collect(),
            );
        }
        if all(ScalarKind::Bool) {
            return NativeValue::BooleanArray(
                items
                    .iter()
                    .filter_map(|s| match s {
                        Scalar::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect(),
            );
        }
        if items.iter().all(|s| s.as_f64().is_some()) {
            return NativeValue::NumberArray(items.iter().filter_map(Scalar::as_f64).collect());
        }
    }
    // Text lists, plus the mixed or empty lists only hand-built trees can hold.
    NativeValue::TextArray(
        items
            .iter()
            .map(|s| match s {
                Scalar::Text(t) => t.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;

    fn native(input: Value) -> NativeFilter {
        translate(&parse_filter(&input).unwrap().unwrap())
    }

    #[test]
    fn test_leaf_rest_json() {
        let nf = native(json!({"property": "round", "operator": "equal", "value": "Double Jeopardy!"}));
        assert_eq!(
            nf.to_json(),
            json!({"operator": "Equal", "path": ["round"], "valueText": "Double Jeopardy!"})
        );
    }

    #[test]
    fn test_operator_table() {
        let cases = [
            ("equal", json!(1), "Equal", "valueInt"),
            ("not_equal", json!(1.5), "NotEqual", "valueNumber"),
            ("less_than", json!(1), "LessThan", "valueInt"),
            ("less_or_equal", json!(1), "LessThanEqual", "valueInt"),
            ("greater_than", json!(1), "GreaterThan", "valueInt"),
            ("greater_or_equal", json!(1), "GreaterThanEqual", "valueInt"),
            ("like", json!("a*"), "Like", "valueText"),
            ("contains_any", json!(["a"]), "ContainsAny", "valueTextArray"),
            ("contains_all", json!([1, 2]), "ContainsAll", "valueIntArray"),
            ("is_none", json!(true), "IsNull", "valueBoolean"),
        ];
        for (keyword, value, expected_op, expected_key) in cases {
            let nf = native(json!({"property": "p", "operator": keyword, "value": value}));
            let rendered = nf.to_json();
            assert_eq!(rendered["operator"], expected_op, "operator for {}", keyword);
            assert!(
                rendered.get(expected_key).is_some(),
                "{} should use {}: {}",
                keyword,
                expected_key,
                rendered
            );
        }
    }

    #[test]
    fn test_group_structure_preserved() {
        let nf = native(json!([
            {"property": "price", "operator": "less_than", "value": 50},
            {"operator": "or", "filters": [
                {"property": "tags", "operator": "contains_any", "value": [true, false]},
                {"property": "score", "operator": "greater_than", "value": 0.5}
            ]}
        ]));
        assert_eq!(
            nf.to_json(),
            json!({
                "operator": "And",
                "operands": [
                    {"operator": "LessThan", "path": ["price"], "valueInt": 50},
                    {"operator": "Or", "operands": [
                        {"operator": "ContainsAny", "path": ["tags"], "valueBooleanArray": [true, false]},
                        {"operator": "GreaterThan", "path": ["score"], "valueNumber": 0.5}
                    ]}
                ]
            })
        );
    }

    #[test]
    fn test_graphql_rendering() {
        let nf = native(json!({"operator": "or", "filters": [
            {"property": "title", "operator": "like", "value": "say \"hi\"*"},
            {"property": "year", "operator": "contains_any", "value": [1999, 2001]}
        ]}));
        assert_eq!(
            nf.to_graphql(),
            r#"{operator: Or, operands: [{operator: Like, path: ["title"], valueText: "say \"hi\"*"}, {operator: ContainsAny, path: ["year"], valueIntArray: [1999,2001]}]}"#
        );
    }

    #[test]
    fn test_hand_built_mixed_list_still_translates() {
        let expr = FilterExpr::comparison(
            "x",
            Operator::ContainsAny,
            vec![Scalar::from("a"), Scalar::from(2i64)],
        );
        assert_eq!(
            translate(&expr),
            NativeFilter::Leaf {
                operator: NativeOperator::ContainsAny,
                path: vec!["x".into()],
                value: NativeValue::TextArray(vec!["a".into(), "2".into()]),
            }
        );
    }
}
