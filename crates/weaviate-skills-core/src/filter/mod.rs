//! Filter expression engine.
//!
//! ```text
//!  JSON ──parse──▶ FilterExpr ──translate──▶ NativeFilter ──▶ query service
//!                      │
//!                      └──evaluate(record)──▶ bool   (in-memory reference)
//! ```
//!
//! The parser is the single validation gate: once a [`FilterExpr`] exists,
//! translation cannot fail.
//!
//! ```rust
//! use serde_json::json;
//! use weaviate_skills_core::filter::{evaluate, parse_filter, translate};
//!
//! let expr = parse_filter(&json!({"property": "category", "operator": "equal", "value": "Science"}))
//!     .unwrap()
//!     .unwrap();
//! let record = json!({"category": "Science"}).as_object().cloned().unwrap();
//! assert!(evaluate(&expr, &record).unwrap());
//! assert_eq!(
//!     translate(&expr).to_graphql(),
//!     r#"{operator: Equal, path: ["category"], valueText: "Science"}"#
//! );
//! ```

pub mod ast;
pub mod eval;
pub mod parse;
pub mod translate;

pub use ast::{Combinator, FilterExpr, FilterValue, Operator, Scalar, ScalarKind, ValueShape};
pub use eval::{evaluate, EvalError, Evaluator, MissingProperty, Record};
pub use parse::{
    parse_filter, parse_filter_str, parse_filter_with_catalog, ParseError, ParseErrorKind,
    PropertyCatalog,
};
pub use translate::{translate, NativeFilter, NativeOperator, NativeValue};
