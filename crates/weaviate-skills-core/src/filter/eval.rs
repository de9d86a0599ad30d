//! In-memory reference evaluator.
//!
//! Decides whether one record (a JSON object of property values) satisfies a
//! [`FilterExpr`]. It backs [`InMemoryService`](crate::service::memory::InMemoryService)
//! and lets filter behavior be tested without a live service.
//!
//! # Comparison semantics
//!
//! - Numbers compare as `f64`, so `40` equals `40.0`.
//! - Ordering operators compare number with number and string with string
//!   (byte order). Any other pairing is [`EvalError::TypeMismatch`].
//! - `like` is an anchored, case-sensitive wildcard match: `*` matches any
//!   run of characters, `?` exactly one.
//! - `contains_any` / `contains_all` test list membership; a scalar record
//!   value behaves as a one-element list.
//! - `is_none: true` matches absent or `null` properties.
//! - Any other operator on an absent property follows the configured
//!   [`MissingProperty`] policy (non-match by default).

use serde_json::{Map, Value};
use std::cmp::Ordering;
use thiserror::Error;

use super::ast::{Combinator, FilterExpr, FilterValue, Operator, Scalar};

/// A record's property values.
pub type Record = Map<String, Value>;

/// What a comparison does when its property is absent or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingProperty {
    /// The comparison is false.
    #[default]
    NoMatch,
    /// Evaluation fails with [`EvalError::MissingProperty`].
    Error,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot apply '{operator}' to property '{property}': record holds {found}, filter holds {expected}")]
    TypeMismatch {
        property: String,
        operator: Operator,
        found: &'static str,
        expected: &'static str,
    },

    #[error("property '{0}' is not present on the record")]
    MissingProperty(String),
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    missing: MissingProperty,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_property(mut self, policy: MissingProperty) -> Self {
        self.missing = policy;
        self
    }

    pub fn evaluate(&self, expr: &FilterExpr, record: &Record) -> Result<bool, EvalError> {
        match expr {
            FilterExpr::Combinator {
                operator: Combinator::And,
                children,
            } => {
                for child in children {
                    if !self.evaluate(child, record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            FilterExpr::Combinator {
                operator: Combinator::Or,
                children,
            } => {
                for child in children {
                    if self.evaluate(child, record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            FilterExpr::Comparison {
                property,
                operator,
                value,
            } => self.compare(property, *operator, value, record),
        }
    }

    fn compare(
        &self,
        property: &str,
        operator: Operator,
        value: &FilterValue,
        record: &Record,
    ) -> Result<bool, EvalError> {
        let actual = record.get(property).filter(|v| !v.is_null());

        if operator == Operator::IsNone {
            let want_none = matches!(value, FilterValue::Scalar(Scalar::Bool(true)));
            return Ok(actual.is_none() == want_none);
        }

        let actual = match actual {
            Some(v) => v,
            None => {
                return match self.missing {
                    MissingProperty::NoMatch => Ok(false),
                    MissingProperty::Error => Err(EvalError::MissingProperty(property.to_string())),
                }
            }
        };

        match operator {
            Operator::Equal => Ok(value_eq(actual, value)),
            Operator::NotEqual => Ok(!value_eq(actual, value)),
            Operator::LessThan
            | Operator::LessOrEqual
            | Operator::GreaterThan
            | Operator::GreaterOrEqual => {
                let ord = match value {
                    FilterValue::Scalar(s) => compare_scalar(actual, s),
                    FilterValue::List(_) => None,
                };
                let ord = ord.ok_or_else(|| EvalError::TypeMismatch {
                    property: property.to_string(),
                    operator,
                    found: json_type_name(actual),
                    expected: filter_type_name(value),
                })?;
                Ok(match operator {
                    Operator::LessThan => ord == Ordering::Less,
                    Operator::LessOrEqual => ord != Ordering::Greater,
                    Operator::GreaterThan => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                })
            }
            Operator::Like => match (actual, value) {
                (Value::String(text), FilterValue::Scalar(Scalar::Text(pattern))) => {
                    Ok(like_match(pattern, text))
                }
                _ => Ok(false),
            },
            Operator::ContainsAny | Operator::ContainsAll => {
                let elements: Vec<&Value> = match actual {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                let wanted: &[Scalar] = match value {
                    FilterValue::List(items) => items,
                    FilterValue::Scalar(s) => std::slice::from_ref(s),
                };
                let present = |s: &Scalar| elements.iter().any(|e| scalar_eq(e, s));
                Ok(if operator == Operator::ContainsAny {
                    wanted.iter().any(present)
                } else {
                    wanted.iter().all(present)
                })
            }
            Operator::IsNone => unreachable!("handled above"),
        }
    }
}

/// Evaluate with the default policy (absent property is a non-match).
pub fn evaluate(expr: &FilterExpr, record: &Record) -> Result<bool, EvalError> {
    Evaluator::default().evaluate(expr, record)
}

fn scalar_eq(actual: &Value, expected: &Scalar) -> bool {
    match (actual, expected) {
        (Value::String(a), Scalar::Text(b)) => a == b,
        (Value::Bool(a), Scalar::Bool(b)) => a == b,
        (Value::Number(a), s) => match (a.as_f64(), s.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => false,
    }
}

fn value_eq(actual: &Value, expected: &FilterValue) -> bool {
    match (actual, expected) {
        (_, FilterValue::Scalar(s)) => scalar_eq(actual, s),
        (Value::Array(items), FilterValue::List(list)) => {
            items.len() == list.len() && items.iter().zip(list).all(|(a, b)| scalar_eq(a, b))
        }
        _ => false,
    }
}

fn compare_scalar(actual: &Value, expected: &Scalar) -> Option<Ordering> {
    match (actual, expected) {
        (Value::String(a), Scalar::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Number(a), s) => a.as_f64()?.partial_cmp(&s.as_f64()?),
        _ => None,
    }
}

/// Anchored wildcard match: `*` is any run of characters, `?` is one character.
///
/// Greedy two-pointer scan with a single backtrack point at the last `*`.
fn like_match(pattern: &str, text: &str) -> bool {
    let (mut p, mut t) = (0, 0);
    // (pattern offset after the last `*`, text offset that `*` has absorbed up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while let Some(tc) = text[t..].chars().next() {
        match pattern[p..].chars().next() {
            Some('*') => {
                p += 1;
                backtrack = Some((p, t));
                continue;
            }
            Some(pc) if pc == '?' || pc == tc => {
                p += pc.len_utf8();
                t += tc.len_utf8();
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((bp, bt)) => {
                let skip = text[bt..].chars().next().map_or(1, char::len_utf8);
                backtrack = Some((bp, bt + skip));
                p = bp;
                t = bt + skip;
            }
            None => return false,
        }
    }
    pattern[p..].chars().all(|c| c == '*')
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn filter_type_name(value: &FilterValue) -> &'static str {
    match value {
        FilterValue::List(_) => "a list",
        FilterValue::Scalar(Scalar::Text(_)) => "a string",
        FilterValue::Scalar(Scalar::Bool(_)) => "a boolean",
        FilterValue::Scalar(_) => "a number",
    }
}
