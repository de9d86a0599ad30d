//! In-memory [`QueryService`] implementation for tests and offline use.
//!
//! Collections live in a `BTreeMap` behind `std::sync::RwLock`. Filters run
//! through the reference [`Evaluator`]. Keyword and hybrid search rank by the
//! number of query terms found in the searched properties; there is no
//! vectorizer, so semantic search is rejected. Aggregates are computed over
//! every stored object, list properties contributing each element.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::filter::{Evaluator, FilterExpr, Record};
use crate::models::{
    CollectionAggregate, CollectionInfo, DataObject, MetricKind, ObjectMetadata, PropertyMetrics,
    TopOccurrence,
};
use crate::query::{
    project, AggregateRequest, FetchRequest, SearchMode, SearchRequest, TOP_OCCURRENCES_LIMIT,
};
use crate::schema::{normalize_collection_name, CollectionDefinition};

use super::{BatchError, BatchOutcome, QueryService};

struct StoredObject {
    uuid: String,
    tenant: Option<String>,
    properties: Record,
    created_ms: i64,
}

struct StoredCollection {
    info: CollectionInfo,
    objects: Vec<StoredObject>,
}

/// In-memory query service.
pub struct InMemoryService {
    collections: RwLock<BTreeMap<String, StoredCollection>>,
    evaluator: Evaluator,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::with_evaluator(Evaluator::new())
    }

    pub fn with_evaluator(evaluator: Evaluator) -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            evaluator,
        }
    }

    /// Register a collection directly, replacing any existing one.
    pub fn insert_collection(&self, info: CollectionInfo) -> Result<()> {
        self.write()?.insert(
            info.name.clone(),
            StoredCollection {
                info,
                objects: Vec::new(),
            },
        );
        Ok(())
    }

    /// Number of objects stored in a collection, across tenants.
    pub fn object_count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .read()?
            .get(collection)
            .map(|c| c.objects.len())
            .unwrap_or(0))
    }

    /// Objects stored under one tenant.
    pub fn tenant_count(&self, collection: &str, tenant: &str) -> Result<usize> {
        Ok(self
            .read()?
            .get(collection)
            .map(|c| {
                c.objects
                    .iter()
                    .filter(|o| o.tenant.as_deref() == Some(tenant))
                    .count()
            })
            .unwrap_or(0))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, StoredCollection>>> {
        self.collections
            .read()
            .map_err(|_| anyhow!("collection store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, StoredCollection>>> {
        self.collections
            .write()
            .map_err(|_| anyhow!("collection store lock poisoned"))
    }

    fn matches(&self, filter: Option<&FilterExpr>, record: &Record) -> Result<bool> {
        match filter {
            Some(expr) => Ok(self.evaluator.evaluate(expr, record)?),
            None => Ok(true),
        }
    }
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn to_object(stored: &StoredObject, properties: Option<&[String]>) -> DataObject {
    let mut obj = DataObject {
        uuid: stored.uuid.clone(),
        properties: stored.properties.clone(),
        metadata: ObjectMetadata {
            creation_time_unix: Some(stored.created_ms),
            ..Default::default()
        },
    };
    if let Some(props) = properties {
        project(&mut obj, props);
    }
    obj
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(&s.to_lowercase());
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

fn term_score(record: &Record, terms: &[String], fields: Option<&[String]>) -> usize {
    let mut text = String::new();
    for (k, v) in record {
        if fields.map_or(true, |f| f.iter().any(|p| p == k)) {
            collect_text(v, &mut text);
        }
    }
    terms.iter().filter(|t| text.contains(t.as_str())).count()
}

fn property_values<'a>(objects: &'a [StoredObject], name: &str) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for value in objects.iter().filter_map(|o| o.properties.get(name)) {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            Value::Null => {}
            other => out.push(other),
        }
    }
    out
}

/// Most frequent element of a sorted slice; the smallest wins ties.
fn sorted_mode<T: PartialEq + Copy>(sorted: &[T]) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        if best.map_or(true, |(_, run)| j - i > run) {
            best = Some((sorted[i], j - i));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}

fn text_metrics(values: &[&Value]) -> PropertyMetrics {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for text in values.iter().filter_map(|v| v.as_str()) {
        *counts.entry(text).or_default() += 1;
    }
    let count: u64 = counts.values().sum();
    let mut top: Vec<(&str, u64)> = counts.into_iter().collect();
    // Stable: equal counts stay in value order.
    top.sort_by(|a, b| b.1.cmp(&a.1));
    top.truncate(TOP_OCCURRENCES_LIMIT);
    PropertyMetrics {
        count: Some(count),
        top_occurrences: top
            .into_iter()
            .map(|(value, count)| TopOccurrence {
                value: value.to_string(),
                count,
            })
            .collect(),
        ..Default::default()
    }
}

fn numeric_metrics(values: &[&Value], integral: bool) -> PropertyMetrics {
    let mut nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    nums.sort_by(f64::total_cmp);
    let (Some(&min), Some(&max)) = (nums.first(), nums.last()) else {
        return PropertyMetrics {
            count: Some(0),
            ..Default::default()
        };
    };
    let n = nums.len();
    let sum: f64 = nums.iter().sum();
    let median = if n % 2 == 1 {
        nums[n / 2]
    } else {
        (nums[n / 2 - 1] + nums[n / 2]) / 2.0
    };
    let typed = |x: f64| {
        if integral {
            Value::from(x as i64)
        } else {
            Value::from(x)
        }
    };
    PropertyMetrics {
        count: Some(n as u64),
        minimum: Some(typed(min)),
        maximum: Some(typed(max)),
        mean: Some(sum / n as f64),
        median: Some(Value::from(median)),
        mode: sorted_mode(&nums).map(typed),
        sum: Some(sum),
        ..Default::default()
    }
}

fn boolean_metrics(values: &[&Value]) -> PropertyMetrics {
    let bools: Vec<bool> = values.iter().filter_map(|v| v.as_bool()).collect();
    let n = bools.len() as u64;
    let total_true = bools.iter().filter(|b| **b).count() as u64;
    let share = |k: u64| (n > 0).then(|| k as f64 / n as f64);
    PropertyMetrics {
        count: Some(n),
        total_true: Some(total_true),
        total_false: Some(n - total_true),
        percentage_true: share(total_true),
        percentage_false: share(n - total_true),
        ..Default::default()
    }
}

/// RFC 3339 timestamps in one offset order lexically.
fn date_metrics(values: &[&Value]) -> PropertyMetrics {
    let mut dates: Vec<&str> = values.iter().filter_map(|v| v.as_str()).collect();
    dates.sort_unstable();
    let (Some(&min), Some(&max)) = (dates.first(), dates.last()) else {
        return PropertyMetrics {
            count: Some(0),
            ..Default::default()
        };
    };
    PropertyMetrics {
        count: Some(dates.len() as u64),
        minimum: Some(Value::from(min)),
        maximum: Some(Value::from(max)),
        median: Some(Value::from(dates[(dates.len() - 1) / 2])),
        mode: sorted_mode(&dates).map(Value::from),
        ..Default::default()
    }
}

fn metrics_for(kind: MetricKind, values: &[&Value]) -> PropertyMetrics {
    match kind {
        MetricKind::Text => text_metrics(values),
        MetricKind::Int => numeric_metrics(values, true),
        MetricKind::Number => numeric_metrics(values, false),
        MetricKind::Boolean => boolean_metrics(values),
        MetricKind::Date => date_metrics(values),
    }
}

#[async_trait]
impl QueryService for InMemoryService {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        Ok(self.read()?.values().map(|c| c.info.clone()).collect())
    }

    /// Resolves the name the way the server does, upper-casing a leading
    /// lower-case letter. Every other operation takes the exact name.
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let (name, _) = normalize_collection_name(name);
        Ok(self.read()?.get(&name).map(|c| c.info.clone()))
    }

    async fn create_collection(&self, def: &CollectionDefinition) -> Result<CollectionInfo> {
        def.validate()?;
        let mut collections = self.write()?;
        if collections
            .keys()
            .any(|k| k.eq_ignore_ascii_case(&def.name))
        {
            bail!("collection '{}' already exists", def.name);
        }
        let info = def.to_info();
        collections.insert(
            def.name.clone(),
            StoredCollection {
                info: info.clone(),
                objects: Vec::new(),
            },
        );
        Ok(info)
    }

    async fn fetch_objects(&self, req: &FetchRequest) -> Result<Vec<DataObject>> {
        let collections = self.read()?;
        let coll = collections
            .get(&req.collection)
            .ok_or_else(|| anyhow!("collection '{}' not found", req.collection))?;
        let mut out = Vec::new();
        let mut skipped = 0;
        for stored in &coll.objects {
            if out.len() >= req.limit {
                break;
            }
            if !self.matches(req.filter.as_ref(), &stored.properties)? {
                continue;
            }
            if skipped < req.offset {
                skipped += 1;
                continue;
            }
            out.push(to_object(stored, req.properties.as_deref()));
        }
        Ok(out)
    }

    async fn fetch_object_by_id(
        &self,
        collection: &str,
        id: &str,
        properties: Option<&[String]>,
    ) -> Result<Option<DataObject>> {
        let collections = self.read()?;
        let coll = match collections.get(collection) {
            Some(c) => c,
            None => return Ok(None),
        };
        Ok(coll
            .objects
            .iter()
            .find(|o| o.uuid.eq_ignore_ascii_case(id))
            .map(|o| to_object(o, properties)))
    }

    async fn search(&self, req: &SearchRequest) -> Result<Vec<DataObject>> {
        if req.mode == SearchMode::Semantic {
            bail!("semantic search needs a vectorizer, which the in-memory service does not have");
        }
        let terms: Vec<String> = req
            .query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let collections = self.read()?;
        let coll = collections
            .get(&req.collection)
            .ok_or_else(|| anyhow!("collection '{}' not found", req.collection))?;

        let mut hits: Vec<(usize, &StoredObject)> = Vec::new();
        for stored in &coll.objects {
            if !self.matches(req.filter.as_ref(), &stored.properties)? {
                continue;
            }
            let score = term_score(&stored.properties, &terms, req.query_properties.as_deref());
            if score > 0 {
                hits.push((score, stored));
            }
        }
        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        hits.truncate(req.limit);

        Ok(hits
            .into_iter()
            .map(|(score, stored)| {
                let mut obj = to_object(stored, req.return_properties.as_deref());
                obj.metadata.score = Some(score as f64 / terms.len() as f64);
                obj
            })
            .collect())
    }

    async fn insert_objects(
        &self,
        collection: &str,
        tenant: Option<&str>,
        records: &[Record],
    ) -> Result<BatchOutcome> {
        let mut collections = self.write()?;
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow!("collection '{}' not found", collection))?;

        let multi_tenant = coll.info.is_multi_tenant();
        let rejection = match (multi_tenant, tenant) {
            (true, None) => Some(format!(
                "class {} has multi-tenancy enabled, but request was without tenant",
                collection
            )),
            (false, Some(_)) => Some(format!(
                "class {} has multi-tenancy disabled, but request was with tenant",
                collection
            )),
            _ => None,
        };

        let mut outcome = BatchOutcome::default();
        for (index, record) in records.iter().enumerate() {
            if let Some(message) = &rejection {
                outcome.errors.push(BatchError {
                    index,
                    message: message.clone(),
                });
                continue;
            }
            coll.objects.push(StoredObject {
                uuid: uuid::Uuid::new_v4().to_string(),
                tenant: tenant.map(str::to_string),
                properties: record.clone(),
                created_ms: now_ms(),
            });
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn aggregate(&self, req: &AggregateRequest) -> Result<CollectionAggregate> {
        let collections = self.read()?;
        let coll = collections
            .get(&req.collection)
            .ok_or_else(|| anyhow!("collection '{}' not found", req.collection))?;
        let properties = req
            .metrics
            .iter()
            .map(|(name, kind)| {
                let values = property_values(&coll.objects, name);
                (name.clone(), metrics_for(*kind, &values))
            })
            .collect();
        Ok(CollectionAggregate {
            total_count: coll.objects.len() as u64,
            properties,
        })
    }
}
