//! Backend seams: a document store with live queries and blob storage.
//!
//! Task logic only talks to these traits. The local implementations keep
//! everything on disk under the TaskBuddy home directory.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BlobError, StoreError};

pub mod blob;
pub mod local;

pub use blob::LocalBlobStore;
pub use local::LocalDocumentStore;

/// Field map of a document, without its id.
pub type Fields = Map<String, Value>;

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

/// Equality query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub field: String,
    pub value: Value,
}

impl Query {
    /// Documents of `collection` whose `field` equals `value`.
    pub fn eq(collection: &str, field: &str, value: impl Into<Value>) -> Self {
        Query { collection: collection.into(), field: field.into(), value: value.into() }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.fields.get(&self.field) == Some(&self.value)
    }
}

/// Stream of full result sets. Every item replaces the previous one.
pub type SnapshotStream = BoxStream<'static, Result<Vec<Document>, StoreError>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return the id the store assigned.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merge `patch` into an existing document. Fails if it does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), StoreError>;

    /// Remove a document. Removing a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Live query. The first item is the current result set; later items
    /// arrive whenever the collection changes. Dropping the stream cancels
    /// the subscription.
    fn watch(&self, query: Query) -> SnapshotStream;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key` and return a URL it can be fetched from.
    async fn upload(&self, key: &str, data: &[u8]) -> Result<String, BlobError>;
}
