//! File-based document storage.
//!
//! Documents live in `documents/{collection}/{id}.json`. The unique key
//! index is a directory of marker files, `keys/{collection}/{encoded key}`,
//! each holding the owning document id. Markers are created with
//! `O_EXCL`, so two writers racing for the same key cannot both win, even
//! across processes.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use tracing::warn;

use super::sanitize_name;
use crate::domain::Document;
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::DocumentStorage;

/// File-based document storage implementation.
pub struct FileDocumentStorage {
    documents_dir: PathBuf,
    keys_dir: PathBuf,
    /// Serializes writers within this process.
    lock: Mutex<()>,
}

impl FileDocumentStorage {
    /// Create a new file document storage.
    pub fn new(documents_dir: PathBuf, keys_dir: PathBuf) -> Self {
        Self {
            documents_dir,
            keys_dir,
            lock: Mutex::new(()),
        }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.documents_dir.join(sanitize_name(collection))
    }

    fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", sanitize_name(id)))
    }

    fn key_path(&self, collection: &str, key: &str) -> PathBuf {
        self.keys_dir
            .join(sanitize_name(collection))
            .join(URL_SAFE_NO_PAD.encode(key.as_bytes()))
    }

    fn ensure_collection(&self, collection: &str) -> StorageResult<()> {
        std::fs::create_dir_all(self.collection_dir(collection))?;
        std::fs::create_dir_all(self.keys_dir.join(sanitize_name(collection)))?;
        Ok(())
    }

    fn read_document(path: &Path) -> StorageResult<Option<Document>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `doc` to a temp file next to `path` and return the temp path.
    fn write_temp(path: &Path, doc: &Document) -> StorageResult<PathBuf> {
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(doc)?)?;
        file.sync_all()?;
        Ok(tmp)
    }

    /// Claim a key marker for `id`.
    fn claim_key(&self, collection: &str, key: &str, id: &str) -> StorageResult<()> {
        let path = self.key_path(collection, key);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(id.as_bytes())?;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StorageError::DuplicateKey(
                format!("{collection}: key '{key}' already exists"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a key marker if it still belongs to `id`.
    fn release_key(&self, collection: &str, key: &str, id: &str) -> StorageResult<()> {
        let path = self.key_path(collection, key);
        match std::fs::read_to_string(&path) {
            Ok(owner) if owner == id => match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_sync(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        let _guard = self.lock.lock();
        self.ensure_collection(collection)?;

        if let Some(key) = &doc.key {
            self.claim_key(collection, key, &doc.id)?;
        }

        let path = self.document_path(collection, &doc.id);
        let linked = Self::write_temp(&path, doc).and_then(|tmp| {
            // hard_link refuses to overwrite, so an existing id is never clobbered.
            let result = std::fs::hard_link(&tmp, &path);
            if let Err(e) = std::fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %e, "Failed to remove temp document");
            }
            match result {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StorageError::DuplicateKey(
                    format!("{collection}: id '{}' already exists", doc.id),
                )),
                Err(e) => Err(e.into()),
            }
        });

        if linked.is_err() {
            if let Some(key) = &doc.key {
                self.release_key(collection, key, &doc.id)?;
            }
        }
        linked
    }

    fn replace_sync(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        let _guard = self.lock.lock();
        let path = self.document_path(collection, &doc.id);

        let existing = Self::read_document(&path)?.ok_or_else(|| {
            StorageError::NotFound(format!("{collection}: document '{}' not found", doc.id))
        })?;

        let updated = Document {
            id: existing.id,
            key: existing.key,
            body: doc.body.clone(),
        };
        let tmp = Self::write_temp(&path, &updated)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete_sync(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock();
        let path = self.document_path(collection, id);

        let Some(existing) = Self::read_document(&path)? else {
            return Ok(false);
        };
        std::fs::remove_file(&path)?;
        if let Some(key) = &existing.key {
            self.release_key(collection, key, &existing.id)?;
        }
        Ok(true)
    }

    fn list_sync(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let dir = self.collection_dir(collection);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(doc) = Self::read_document(&path)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl DocumentStorage for FileDocumentStorage {
    async fn insert(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        self.insert_sync(collection, doc)
    }

    async fn get(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        Self::read_document(&self.document_path(collection, id))
    }

    async fn find_by_key(&self, collection: &str, key: &str) -> StorageResult<Option<Document>> {
        let id = match std::fs::read_to_string(self.key_path(collection, key)) {
            Ok(id) => id,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::read_document(&self.document_path(collection, &id))
    }

    async fn list(&self, collection: &str) -> StorageResult<Vec<Document>> {
        self.list_sync(collection)
    }

    async fn replace(&self, collection: &str, doc: &Document) -> StorageResult<()> {
        self.replace_sync(collection, doc)
    }

    async fn delete(&self, collection: &str, id: &str) -> StorageResult<bool> {
        self.delete_sync(collection, id)
    }

    async fn delete_all(&self, collection: &str) -> StorageResult<u64> {
        let mut removed = 0;
        for doc in self.list_sync(collection)? {
            if self.delete_sync(collection, &doc.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn count(&self, collection: &str) -> StorageResult<u64> {
        Ok(self.list_sync(collection)?.len() as u64)
    }
}
