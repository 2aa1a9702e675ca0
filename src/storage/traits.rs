//! Storage trait definitions.
//!
//! These traits define the interface for storage backends, enabling swapping
//! between different implementations without changing business logic.

use async_trait::async_trait;

use crate::domain::{CounterState, Document};
use crate::error::StorageResult;

/// Named counter operations.
///
/// Every mutating operation is a single storage-level read-modify-write.
#[async_trait]
pub trait CounterStorage: Send + Sync {
    /// Atomically add one to the counter and return the new value.
    ///
    /// A missing counter is created at 0 first, so the first call returns 1.
    async fn increment(&self, name: &str) -> StorageResult<i64>;

    /// Raise the counter to at least `seq` and return the resulting value.
    ///
    /// Creates the counter when missing. Never lowers an existing value.
    async fn raise_floor(&self, name: &str, seq: i64) -> StorageResult<i64>;

    /// Get the counter state, if the counter exists.
    async fn get_counter(&self, name: &str) -> StorageResult<Option<CounterState>>;
}

/// JSON document operations over named collections.
///
/// Each collection has a unique index on `Document::key`.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Insert a new document.
    ///
    /// Fails with `StorageError::DuplicateKey` when the id or the key is
    /// already taken in the collection.
    async fn insert(&self, collection: &str, doc: &Document) -> StorageResult<()>;

    /// Get a document by id.
    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>>;

    /// Get a document by its unique key.
    async fn find_by_key(&self, collection: &str, key: &str) -> StorageResult<Option<Document>>;

    /// List all documents in a collection, in no particular order.
    async fn list(&self, collection: &str) -> StorageResult<Vec<Document>>;

    /// Replace the body of an existing document. The key is left unchanged.
    ///
    /// Fails with `StorageError::NotFound` if the document does not exist.
    async fn replace(&self, collection: &str, doc: &Document) -> StorageResult<()>;

    /// Delete a document by id. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool>;

    /// Delete every document in a collection. Returns the number removed.
    async fn delete_all(&self, collection: &str) -> StorageResult<u64>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> StorageResult<u64>;
}

/// Combined storage trait for all storage operations.
#[async_trait]
pub trait Storage: CounterStorage + DocumentStorage {
    /// Check if the storage backend is healthy and reachable.
    async fn health_check(&self) -> StorageResult<()>;

    /// Get the storage backend name.
    fn backend_name(&self) -> &'static str;
}
