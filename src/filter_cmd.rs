//! `wsk filter check|eval`: work with filter expressions offline.
//!
//! Neither subcommand needs a cluster. `check` prints the native filter a
//! `fetch` or `search` would send; `eval` runs the filter against one JSON
//! record with the reference evaluator. Pass `-` to read the filter from
//! stdin.

use std::io::Read;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use weaviate_skills_core::filter::{
    parse_filter_str, translate, Evaluator, FilterExpr, MissingProperty, Record,
};

fn read_filter_text(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read filter from stdin")?;
        Ok(buf)
    } else {
        Ok(arg.to_string())
    }
}

fn parse_required(text: &str) -> Result<FilterExpr> {
    match parse_filter_str(text)? {
        Some(expr) => Ok(expr),
        None => bail!("Filter is empty"),
    }
}

/// Parse and translate; returns the text `check` prints.
pub fn check(text: &str, graphql: bool) -> Result<String> {
    let expr = parse_required(text)?;
    let native = translate(&expr);
    if graphql {
        Ok(native.to_graphql())
    } else {
        Ok(serde_json::to_string_pretty(&native)?)
    }
}

/// Parse the filter and the record, then evaluate.
pub fn eval(text: &str, record: &str, missing: MissingProperty) -> Result<bool> {
    let expr = parse_required(text)?;
    let record: Record = match serde_json::from_str::<Value>(record).context("Invalid JSON in --record")? {
        Value::Object(obj) => obj,
        _ => bail!("--record must be a JSON object"),
    };
    tracing::debug!("evaluating {} against {} properties", expr, record.len());
    let evaluator = Evaluator::new().with_missing_property(missing);
    Ok(evaluator.evaluate(&expr, &record)?)
}

pub fn run_check(filter: &str, graphql: bool) -> Result<()> {
    let text = read_filter_text(filter)?;
    println!("{}", check(&text, graphql)?);
    Ok(())
}

pub fn run_eval(filter: &str, record: &str, strict_missing: bool) -> Result<()> {
    let text = read_filter_text(filter)?;
    let missing = if strict_missing {
        MissingProperty::Error
    } else {
        MissingProperty::NoMatch
    };
    println!("{}", eval(&text, record, missing)?);
    Ok(())
}
