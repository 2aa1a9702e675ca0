//! File-based counter storage.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use fs2::FileExt;
use tokio::sync::Mutex;

use super::sanitize_name;
use crate::domain::CounterState;
use crate::error::{StorageError, StorageResult};
use crate::storage::traits::CounterStorage;

/// File-based counter storage implementation.
///
/// One JSON file per counter. The in-process mutex serializes tasks; the
/// exclusive `flock` serializes processes sharing the data directory.
pub struct FileCounterStorage {
    /// Directory for counter files.
    counters_dir: PathBuf,
    /// Mutex for coordinating file operations within this process.
    lock: Mutex<()>,
}

impl FileCounterStorage {
    /// Create a new file counter storage.
    pub fn new(counters_dir: PathBuf) -> Self {
        Self {
            counters_dir,
            lock: Mutex::new(()),
        }
    }

    /// Get the file path for a counter.
    fn counter_path(&self, name: &str) -> PathBuf {
        self.counters_dir
            .join(format!("{}.json", sanitize_name(name)))
    }

    /// Read counter state from file with exclusive lock.
    fn read_state_locked(&self, name: &str) -> StorageResult<Option<CounterState>> {
        let path = self.counter_path(name);

        if !path.exists() {
            return Ok(None);
        }

        let file = std::fs::File::open(&path)?;
        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let state: CounterState = serde_json::from_reader(&file)?;
        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        Ok(Some(state))
    }

    /// Atomically update counter state, creating it at 0 when missing.
    fn update_state<F>(&self, name: &str, update_fn: F) -> StorageResult<CounterState>
    where
        F: FnOnce(&mut CounterState),
    {
        let path = self.counter_path(name);

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        // A freshly created file is empty until the first write lands.
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let mut state = if contents.trim().is_empty() {
            CounterState::new(name.to_string(), 0)
        } else {
            serde_json::from_str(&contents)?
        };

        update_fn(&mut state);
        state.touch();

        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;

        let json = serde_json::to_string_pretty(&state)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        Ok(state)
    }
}

#[async_trait]
impl CounterStorage for FileCounterStorage {
    async fn increment(&self, name: &str) -> StorageResult<i64> {
        let _guard = self.lock.lock().await;
        let state = self.update_state(name, |state| state.seq += 1)?;
        Ok(state.seq)
    }

    async fn raise_floor(&self, name: &str, seq: i64) -> StorageResult<i64> {
        let _guard = self.lock.lock().await;
        let state = self.update_state(name, |state| state.seq = state.seq.max(seq))?;
        Ok(state.seq)
    }

    async fn get_counter(&self, name: &str) -> StorageResult<Option<CounterState>> {
        let _guard = self.lock.lock().await;
        self.read_state_locked(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileCounterStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileCounterStorage::new(temp_dir.path().to_path_buf());
        (storage, temp_dir)
    }

    #[tokio::test]
    async fn test_increment_creates_counter() {
        let (storage, _temp) = create_test_storage();

        assert!(storage.get_counter("test").await.unwrap().is_none());
        assert_eq!(storage.increment("test").await.unwrap(), 1);
        assert_eq!(storage.increment("test").await.unwrap(), 2);

        let state = storage.get_counter("test").await.unwrap().unwrap();
        assert_eq!(state.seq, 2);
        assert_eq!(state.version, 2);
    }

    #[tokio::test]
    async fn test_sequential_increments_strictly_increase() {
        let (storage, _temp) = create_test_storage();

        let mut last = 0;
        for _ in 0..25 {
            let next = storage.increment("seq").await.unwrap();
            assert!(next > last);
            last = next;
        }
        assert_eq!(last, 25);
    }

    #[tokio::test]
    async fn test_raise_floor_never_lowers() {
        let (storage, _temp) = create_test_storage();

        assert_eq!(storage.raise_floor("floor", 57).await.unwrap(), 57);
        assert_eq!(storage.raise_floor("floor", 12).await.unwrap(), 57);
        assert_eq!(storage.increment("floor").await.unwrap(), 58);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(FileCounterStorage::new(temp_dir.path().to_path_buf()));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let storage = storage.clone();
            handles.push(tokio::spawn(
                async move { storage.increment("shared").await },
            ));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().unwrap());
        }
        values.sort_unstable();
        assert_eq!(values, (1..=20).collect::<Vec<i64>>());
    }
}
