//! Filter expression tree.
//!
//! A [`FilterExpr`] is either a single property [`Comparison`](FilterExpr::Comparison)
//! or an AND/OR [`Combinator`](FilterExpr::Combinator) over child expressions.
//! Trees are normally produced by [`parse_filter`](super::parse_filter), which
//! is the only place values are checked against their operators.

use serde_json::{Map, Number, Value};
use std::fmt;

/// Comparison operator of a leaf filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Like,
    ContainsAny,
    ContainsAll,
    IsNone,
}

/// The kind of value an [`Operator`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// A single string, number, or boolean.
    Scalar,
    /// A single string.
    Text,
    /// A single boolean.
    Boolean,
    /// A non-empty list of scalars of one kind.
    List,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::LessThan,
        Operator::LessOrEqual,
        Operator::GreaterThan,
        Operator::GreaterOrEqual,
        Operator::Like,
        Operator::ContainsAny,
        Operator::ContainsAll,
        Operator::IsNone,
    ];

    /// The keyword used in filter JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::LessThan => "less_than",
            Operator::LessOrEqual => "less_or_equal",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterOrEqual => "greater_or_equal",
            Operator::Like => "like",
            Operator::ContainsAny => "contains_any",
            Operator::ContainsAll => "contains_all",
            Operator::IsNone => "is_none",
        }
    }

    /// Look up an operator keyword, ignoring ASCII case.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(keyword))
    }

    pub fn value_shape(&self) -> ValueShape {
        match self {
            Operator::ContainsAny | Operator::ContainsAll => ValueShape::List,
            Operator::IsNone => ValueShape::Boolean,
            Operator::Like => ValueShape::Text,
            _ => ValueShape::Scalar,
        }
    }

    /// True for `less_than`, `less_or_equal`, `greater_than`, `greater_or_equal`.
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Operator::LessThan
                | Operator::LessOrEqual
                | Operator::GreaterThan
                | Operator::GreaterOrEqual
        )
    }

    fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Like => "LIKE",
            Operator::ContainsAny => "CONTAINS ANY",
            Operator::ContainsAll => "CONTAINS ALL",
            Operator::IsNone => "IS NONE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean grouping operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.eq_ignore_ascii_case("and") {
            Some(Combinator::And)
        } else if keyword.eq_ignore_ascii_case("or") {
            Some(Combinator::Or)
        } else {
            None
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single filter value.
///
/// JSON integers that fit in `i64` become [`Scalar::Int`]; every other number
/// becomes [`Scalar::Number`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Number(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Text,
    Int,
    Number,
    Bool,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Text => "string",
            ScalarKind::Int => "integer",
            ScalarKind::Number => "number",
            ScalarKind::Bool => "boolean",
        }
    }
}

impl Scalar {
    /// Convert a JSON value; `None` for null, arrays, and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Int(i)),
                None => n.as_f64().map(Scalar::Number),
            },
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Int(i) => Value::Number((*i).into()),
            Scalar::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Text(_) => ScalarKind::Text,
            Scalar::Int(_) => ScalarKind::Int,
            Scalar::Number(_) => ScalarKind::Number,
            Scalar::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Numeric value of an `Int` or `Number`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl FilterValue {
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Scalar(s) => s.to_json(),
            FilterValue::List(items) => Value::Array(items.iter().map(Scalar::to_json).collect()),
        }
    }
}

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        FilterValue::Scalar(value)
    }
}

macro_rules! scalar_filter_value {
    ($($t:ty),*) => {
        $(impl From<$t> for FilterValue {
            fn from(value: $t) -> Self {
                FilterValue::Scalar(value.into())
            }
        })*
    };
}

scalar_filter_value!(&str, String, i64, f64, bool);

impl From<Vec<Scalar>> for FilterValue {
    fn from(items: Vec<Scalar>) -> Self {
        FilterValue::List(items)
    }
}

/// A parsed filter condition or combination of conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Comparison {
        property: String,
        operator: Operator,
        value: FilterValue,
    },
    Combinator {
        operator: Combinator,
        children: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    pub fn comparison(
        property: impl Into<String>,
        operator: Operator,
        value: impl Into<FilterValue>,
    ) -> Self {
        FilterExpr::Comparison {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn all_of(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Combinator {
            operator: Combinator::And,
            children,
        }
    }

    pub fn any_of(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Combinator {
            operator: Combinator::Or,
            children,
        }
    }

    /// Canonical JSON rendering in the filter grammar.
    ///
    /// Combinators always render in the explicit `{operator, filters}` form, so
    /// an implicit-AND list parses back to the same tree.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        match self {
            FilterExpr::Comparison {
                property,
                operator,
                value,
            } => {
                obj.insert("property".into(), Value::String(property.clone()));
                obj.insert("operator".into(), Value::String(operator.as_str().into()));
                obj.insert("value".into(), value.to_json());
            }
            FilterExpr::Combinator { operator, children } => {
                obj.insert("operator".into(), Value::String(operator.as_str().into()));
                obj.insert(
                    "filters".into(),
                    Value::Array(children.iter().map(FilterExpr::to_json).collect()),
                );
            }
        }
        Value::Object(obj)
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Comparison {
                property,
                operator,
                value,
            } => write!(f, "{} {} {}", property, operator.symbol(), value.to_json()),
            FilterExpr::Combinator { operator, children } => {
                if children.len() == 1 {
                    return write!(f, "{}", children[0]);
                }
                let sep = match operator {
                    Combinator::And => " AND ",
                    Combinator::Or => " OR ",
                };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_keywords_case_insensitive() {
        assert_eq!(Operator::from_keyword("EQUAL"), Some(Operator::Equal));
        assert_eq!(
            Operator::from_keyword("Contains_Any"),
            Some(Operator::ContainsAny)
        );
        assert_eq!(Operator::from_keyword("between"), None);
        assert_eq!(Combinator::from_keyword("Or"), Some(Combinator::Or));
        assert_eq!(Combinator::from_keyword("not"), None);
    }

    #[test]
    fn test_every_operator_keyword_round_trips() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_keyword(op.as_str()), Some(op));
        }
    }

    #[test]
    fn test_scalar_from_json_keeps_integers() {
        assert_eq!(Scalar::from_json(&json!(40)), Some(Scalar::Int(40)));
        assert_eq!(Scalar::from_json(&json!(40.5)), Some(Scalar::Number(40.5)));
        assert_eq!(Scalar::from_json(&json!(null)), None);
        assert_eq!(Scalar::from_json(&json!(["a"])), None);
    }

    #[test]
    fn test_to_json_renders_explicit_combinator() {
        let expr = FilterExpr::all_of(vec![FilterExpr::comparison(
            "price",
            Operator::LessThan,
            50i64,
        )]);
        assert_eq!(
            expr.to_json(),
            json!({
                "operator": "and",
                "filters": [{"property": "price", "operator": "less_than", "value": 50}]
            })
        );
    }

    #[test]
    fn test_display() {
        let expr = FilterExpr::any_of(vec![
            FilterExpr::comparison("category", Operator::Equal, "Science"),
            FilterExpr::comparison("price", Operator::GreaterOrEqual, 9.5),
        ]);
        assert_eq!(
            expr.to_string(),
            r#"(category = "Science" OR price >= 9.5)"#
        );
    }
}
