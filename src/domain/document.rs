//! Documents and the records stored in them.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageError, StorageResult};

/// A stored JSON document.
///
/// `key` is covered by a unique index within its collection; documents
/// without a key are only unique by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier, unique within the collection.
    pub id: String,

    /// Optional unique key (e.g. a roll number).
    #[serde(default)]
    pub key: Option<String>,

    /// Document body.
    pub body: Value,
}

impl Document {
    /// Build a document from a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized.
    pub fn from_record<T: Record>(record: &T) -> StorageResult<Self> {
        Ok(Self {
            id: record.id().to_string(),
            key: record.unique_key().map(ToString::to_string),
            body: serde_json::to_value(record)?,
        })
    }

    /// Decode the body into a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match the record's shape.
    pub fn into_record<T: Record>(self) -> StorageResult<T> {
        serde_json::from_value(self.body).map_err(|e| {
            StorageError::Serialization(format!(
                "document '{}' in '{}': {e}",
                self.id,
                T::COLLECTION
            ))
        })
    }
}

/// A domain type persisted as a document.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the record lives in.
    const COLLECTION: &'static str;

    /// Document identifier.
    fn id(&self) -> &str;

    /// Unique key, if the collection enforces one.
    fn unique_key(&self) -> Option<&str> {
        None
    }

    /// Creation time, used for ordering.
    fn created_at(&self) -> DateTime<Utc>;
}

/// Generate a new document identifier.
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
