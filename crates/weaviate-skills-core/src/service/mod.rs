//! Query execution abstraction.
//!
//! The [`QueryService`] trait is the boundary between the commands and the
//! hosted database. Commands are written against the trait so that they run
//! unchanged against the HTTP client or the [`memory::InMemoryService`]
//! used in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::filter::Record;
use crate::models::{CollectionAggregate, CollectionInfo, DataObject};
use crate::query::{AggregateRequest, FetchRequest, SearchRequest};
use crate::schema::CollectionDefinition;

/// One object the service refused during a batch insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchError {
    /// Position of the object in the submitted slice.
    pub index: usize,
    pub message: String,
}

/// Result of a batch insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub errors: Vec<BatchError>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// A batch the server never accepted: every object fails with `message`.
    pub fn rejected(count: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            inserted: 0,
            errors: (0..count)
                .map(|index| BatchError {
                    index,
                    message: message.clone(),
                })
                .collect(),
        }
    }

    /// Fold another batch in; `offset` is the position of its first object
    /// in the overall import.
    pub fn merge(&mut self, other: BatchOutcome, offset: usize) {
        self.inserted += other.inserted;
        self.errors.extend(other.errors.into_iter().map(|e| BatchError {
            index: e.index + offset,
            message: e.message,
        }));
    }
}

/// Operations the commands need from the database.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_collections`](QueryService::list_collections) | Every collection in the schema |
/// | [`get_collection`](QueryService::get_collection) | One collection, if it exists |
/// | [`create_collection`](QueryService::create_collection) | Create a collection |
/// | [`fetch_objects`](QueryService::fetch_objects) | Filtered, paginated object listing |
/// | [`fetch_object_by_id`](QueryService::fetch_object_by_id) | One object by UUID |
/// | [`search`](QueryService::search) | Keyword, semantic or hybrid search |
/// | [`insert_objects`](QueryService::insert_objects) | Batch insert |
/// | [`aggregate`](QueryService::aggregate) | Object count and property statistics |
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Returns `None` when the collection does not exist.
    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Create a collection and return it as the service now describes it.
    async fn create_collection(&self, def: &CollectionDefinition) -> Result<CollectionInfo>;

    async fn fetch_objects(&self, req: &FetchRequest) -> Result<Vec<DataObject>>;

    /// Returns `None` when no object has that UUID.
    async fn fetch_object_by_id(
        &self,
        collection: &str,
        id: &str,
        properties: Option<&[String]>,
    ) -> Result<Option<DataObject>>;

    /// Hits come back best first.
    async fn search(&self, req: &SearchRequest) -> Result<Vec<DataObject>>;

    /// Insert one batch. Per-object rejections are reported in the outcome;
    /// only transport-level failures are errors.
    async fn insert_objects(
        &self,
        collection: &str,
        tenant: Option<&str>,
        records: &[Record],
    ) -> Result<BatchOutcome>;

    async fn aggregate(&self, req: &AggregateRequest) -> Result<CollectionAggregate>;
}
