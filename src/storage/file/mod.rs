//! File-based storage backend.
//!
//! This backend stores data as JSON files with file locking for atomic operations.
//! Suitable for development and single-node deployments.
//!
//! Directory structure:
//! ```text
//! data/
//! ├── counters/
//! │   └── {name}.json
//! ├── documents/
//! │   └── {collection}/
//! │       └── {id}.json
//! └── keys/
//!     └── {collection}/
//!         └── {base64url(key)}
//! ```

mod counter;
mod document;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::FileStorageConfig;
use crate::domain::{CounterState, Document};
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{CounterStorage, DocumentStorage, Storage};

pub use counter::FileCounterStorage;
pub use document::FileDocumentStorage;

/// File-based storage implementation.
pub struct FileStorage {
    /// Base data directory.
    base_dir: PathBuf,
    /// Counter storage.
    counter_storage: FileCounterStorage,
    /// Document storage.
    document_storage: FileDocumentStorage,
}

impl FileStorage {
    /// Create a new file storage instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directories cannot be created.
    pub fn new(config: &FileStorageConfig) -> StorageResult<Self> {
        let base_dir = config.data_dir.clone();

        Self::ensure_directories(&base_dir)?;

        Ok(Self {
            counter_storage: FileCounterStorage::new(base_dir.join("counters")),
            document_storage: FileDocumentStorage::new(
                base_dir.join("documents"),
                base_dir.join("keys"),
            ),
            base_dir,
        })
    }

    /// Ensure all required directories exist.
    fn ensure_directories(base_dir: &Path) -> StorageResult<()> {
        let dirs = [
            base_dir.to_path_buf(),
            base_dir.join("counters"),
            base_dir.join("documents"),
            base_dir.join("keys"),
        ];

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| {
                StorageError::FileIO(format!("Failed to create directory {}: {e}", dir.display()))
            })?;
        }

        Ok(())
    }
}

/// Sanitize a name for use as a filename.
pub(crate) fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CounterStorage for FileStorage {
    async fn increment(&self, name: &str) -> StorageResult<i64> {
        self.counter_storage.increment(name).await
    }

    async fn raise_floor(&self, name: &str, seq: i64) -> StorageResult<i64> {
        self.counter_storage.raise_floor(name, seq).await
    }

    async fn get_counter(&self, name: &str) -> StorageResult<Option<CounterState>> {
        self.counter_storage.get_counter(name).await
    }
}

#[async_trait]
impl DocumentStorage for FileStorage {
    async fn insert(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        self.document_storage.insert(collection, doc).await
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        self.document_storage.get(collection, id).await
    }

    async fn find_by_key(&self, collection: &str, key: &str) -> StorageResult<Option<Document>> {
        self.document_storage.find_by_key(collection, key).await
    }

    async fn list(&self, collection: &str) -> StorageResult<Vec<Document>> {
        self.document_storage.list(collection).await
    }

    async fn replace(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        self.document_storage.replace(collection, doc).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        self.document_storage.delete(collection, id).await
    }

    async fn delete_all(&self, collection: &str) -> StorageResult<u64> {
        self.document_storage.delete_all(collection).await
    }

    async fn count(&self, collection: &str) -> StorageResult<u64> {
        self.document_storage.count(collection).await
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn health_check(&self) -> StorageResult<()> {
        if !self.base_dir.exists() {
            return Err(StorageError::Unavailable);
        }

        // Try to create a test file
        let test_file = self.base_dir.join(".health_check");
        tokio::fs::write(&test_file, b"ok")
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check failed: {e}")))?;
        tokio::fs::remove_file(&test_file)
            .await
            .map_err(|e| StorageError::FileIO(format!("Health check cleanup failed: {e}")))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let storage = FileStorage::new(&config).unwrap();
        (storage, temp_dir)
    }

    #[tokio::test]
    async fn test_health_check() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.health_check().await.is_ok());
        assert_eq!(storage.backend_name(), "file");
    }

    #[tokio::test]
    async fn test_counters_and_documents_share_directory() {
        let (storage, temp) = create_test_storage();

        assert_eq!(storage.increment("competition_roll").await.unwrap(), 1);
        storage
            .insert(
                "competition_applications",
                &Document {
                    id: "a1".to_string(),
                    key: Some("1001".to_string()),
                    body: serde_json::json!({}),
                },
            )
            .await
            .unwrap();

        assert!(temp.path().join("counters/competition_roll.json").exists());
        assert!(
            temp.path()
                .join("documents/competition_applications/a1.json")
                .exists()
        );
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("simple"), "simple");
        assert_eq!(sanitize_name("with-dash"), "with-dash");
        assert_eq!(sanitize_name("with_underscore"), "with_underscore");
        assert_eq!(sanitize_name("with/slash"), "with_slash");
        assert_eq!(sanitize_name("../escape"), "___escape");
    }
}
