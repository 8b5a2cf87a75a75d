use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::errors::StoreError;

pub mod memory;

pub use memory::MemoryStore;

// Field map of a single document. The store is schemaless; record shapes in
// crate::models say what the fields mean.
pub type Fields = Map<String, Value>;

// Full matching-document set delivered by a subscription on every change.
// Always the complete current result, never a delta.
pub type Snapshot = Vec<Document>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(Value::as_u64)
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }
}

// Equality filter on a single field, the only query shape the protocol needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter { field: field.to_string(), value: value.into() }
    }

    pub fn matches(&self, document: &Document) -> bool {
        document.fields.get(&self.field) == Some(&self.value)
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// The shared document store capability the coordination core is written
// against. Per-document writes are atomic, last write wins, and nothing here
// ever spans more than one document per call. Any backend with these
// primitives (a cloud document store, the in-memory store below) will do.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait]
pub trait Store: Send + Sync {
    /// Create a document; the store assigns and returns the id.
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Merge field deltas into an existing document. No optimistic
    /// concurrency check: last write wins.
    async fn update(&self, collection: &str, id: &str, deltas: Fields) -> Result<(), StoreError>;

    /// Single-document read.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// One-shot equality-filtered read.
    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Snapshot, StoreError>;

    /// Change notification for an equality-filtered query. The current
    /// snapshot is delivered immediately on attach and again after every
    /// change to the matching set.
    fn subscribe(&self, collection: &str, filters: &[Filter]) -> Result<Subscription, StoreError>;

    /// Change notification for a single document. Snapshots hold zero or one
    /// documents.
    fn watch(&self, collection: &str, id: &str) -> Result<Subscription, StoreError>;
}

/// Live change feed for a query or a single document. Errors arrive in-band;
/// a `None` from [`Subscription::next`] means the feed ended. Dropping the
/// handle releases the underlying listener on every exit path.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>,
        cancel: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Subscription { rx, cancel: Some(cancel) }
    }

    pub async fn next(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
