//! Rule store persisted as a single JSON file, keyed like `chrome.storage.local`.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::sync::broadcast;

use veil_rules::{KeyValueStore, MemoryStore, Record, StorageChange, StoreError};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();
        let record = if path.exists() {
            let text =
                fs::read_to_string(&path).map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
            serde_json::from_str::<Record>(&text)
                .map_err(|e| format!("Invalid store file '{}': {}", path.display(), e))?
        } else {
            Record::new()
        };
        Ok(Self {
            path,
            inner: MemoryStore::from_record(record),
        })
    }

    /// Write `record` to disk. The in-memory copy is only updated after this succeeds.
    fn persist(&self, record: &Record) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(record)?;
        fs::write(&self.path, text)
            .map_err(|e| StoreError::Unavailable(format!("Failed to write '{}': {}", self.path.display(), e)))?;
        debug!("wrote {}", self.path.display());
        Ok(())
    }
}

#[async_trait(?Send)]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        self.inner.get(keys).await
    }

    async fn set(&self, items: Record) -> Result<(), StoreError> {
        let mut staged = self.inner.snapshot();
        staged.extend(items.clone());
        self.persist(&staged)?;
        self.inner.set(items).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut staged = self.inner.snapshot();
        for key in keys {
            staged.remove(*key);
        }
        self.persist(&staged)?;
        self.inner.remove(keys).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.subscribe()
    }
}
