//! Typed access to a document collection.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::domain::{Document, Record};
use crate::error::StorageResult;
use crate::storage::traits::Storage;

/// A collection of `T` records on top of the shared store.
pub struct Collection<T: Record> {
    storage: Arc<dyn Storage>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self::new(self.storage.clone())
    }
}

impl<T: Record> Collection<T> {
    /// Wrap the store.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            _record: PhantomData,
        }
    }

    /// Collection name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        T::COLLECTION
    }

    /// Insert a new record. Fails with `DuplicateKey` on id or key collision.
    pub async fn insert(&self, record: &T) -> StorageResult<()> {
        let doc = Document::from_record(record)?;
        self.storage.insert(T::COLLECTION, &doc).await
    }

    /// Get a record by id.
    pub async fn get(&self, id: &str) -> StorageResult<Option<T>> {
        self.storage
            .get(T::COLLECTION, id)
            .await?
            .map(Document::into_record)
            .transpose()
    }

    /// Get a record by its unique key.
    pub async fn find_by_key(&self, key: &str) -> StorageResult<Option<T>> {
        self.storage
            .find_by_key(T::COLLECTION, key)
            .await?
            .map(Document::into_record)
            .transpose()
    }

    /// All records, newest first.
    pub async fn list(&self) -> StorageResult<Vec<T>> {
        let mut records = self
            .storage
            .list(T::COLLECTION)
            .await?
            .into_iter()
            .map(Document::into_record)
            .collect::<StorageResult<Vec<T>>>()?;
        records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(records)
    }

    /// Persist changes to an existing record.
    pub async fn replace(&self, record: &T) -> StorageResult<()> {
        let doc = Document::from_record(record)?;
        self.storage.replace(T::COLLECTION, &doc).await
    }

    /// Delete a record by id.
    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        self.storage.delete(T::COLLECTION, id).await
    }

    /// Delete every record.
    pub async fn delete_all(&self) -> StorageResult<u64> {
        self.storage.delete_all(T::COLLECTION).await
    }

    /// Number of records.
    pub async fn count(&self) -> StorageResult<u64> {
        self.storage.count(T::COLLECTION).await
    }
}
