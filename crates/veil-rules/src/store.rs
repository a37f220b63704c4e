//! Key-value store capability
//!
//! The rule store only needs `get(keys)`, `set(record)`, `remove(keys)` and a
//! stream of change notifications. `chrome.storage.local` provides exactly that
//! in the extension (see `veil-wasm`); [`MemoryStore`] provides it for tests and
//! the CLI wraps it around a JSON file.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;

// =============================================================================
// Keys
// =============================================================================

pub const KEY_BLOCK_ELEMENTS: &str = "veil_block_elements";
pub const KEY_PRESETS: &str = "veil_presets";
pub const KEY_SETTINGS: &str = "veil_settings";
pub const KEY_TEMP_SELECTED: &str = "veil_temp_selected";

/// Keys whose change invalidates cached rule collections.
pub const COLLECTION_KEYS: [&str; 3] = [KEY_BLOCK_ELEMENTS, KEY_PRESETS, KEY_SETTINGS];

/// A bag of key/value pairs, as returned by `get` and accepted by `set`.
pub type Record = serde_json::Map<String, Value>;

/// One key changed in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl StorageChange {
    pub fn touches_collections(&self) -> bool {
        COLLECTION_KEYS.contains(&self.key.as_str())
    }
}

const CHANGE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Capability
// =============================================================================

/// Async key-value store with change notification.
///
/// Futures are not required to be `Send`: the browser store lives on the page's
/// single thread.
#[async_trait(?Send)]
pub trait KeyValueStore {
    /// Fetch the given keys. Missing keys are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError>;

    /// Write every pair of `items` in one operation.
    async fn set(&self, items: Record) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// In-process store used by tests and the CLI.
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
    available: Mutex<bool>,
    changes: broadcast::Sender<StorageChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data: Mutex::new(HashMap::new()),
            available: Mutex::new(true),
            changes,
        }
    }

    /// Build a store from a JSON object.
    pub fn from_record(record: Record) -> Self {
        let store = Self::new();
        if let Ok(mut data) = store.data.lock() {
            data.extend(record);
        }
        store
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> Record {
        match self.data.lock() {
            Ok(data) => data.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Err(_) => Record::new(),
        }
    }

    /// Simulate the host context going away (or coming back).
    pub fn set_available(&self, available: bool) {
        if let Ok(mut flag) = self.available.lock() {
            *flag = available;
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        match self.available.lock() {
            Ok(flag) if *flag => Ok(()),
            Ok(_) => Err(StoreError::Unavailable("store is disconnected".to_string())),
            Err(_) => Err(StoreError::Unavailable("store lock poisoned".to_string())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>, StoreError> {
        self.data
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn publish(&self, changes: Vec<StorageChange>) {
        for change in changes {
            // No subscribers is fine
            let _ = self.changes.send(change);
        }
    }
}

#[async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        self.check_available()?;
        let data = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, items: Record) -> Result<(), StoreError> {
        self.check_available()?;
        let changes = {
            let mut data = self.lock()?;
            items
                .into_iter()
                .map(|(key, value)| {
                    let old_value = data.insert(key.clone(), value.clone());
                    StorageChange {
                        key,
                        old_value,
                        new_value: Some(value),
                    }
                })
                .collect()
        };
        self.publish(changes);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.check_available()?;
        let changes = {
            let mut data = self.lock()?;
            keys.iter()
                .filter_map(|key| {
                    data.remove(*key).map(|old| StorageChange {
                        key: key.to_string(),
                        old_value: Some(old),
                        new_value: None,
                    })
                })
                .collect()
        };
        self.publish(changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_get_returns_only_present_keys() {
        let store = MemoryStore::new();
        store.set(record(&[(KEY_PRESETS, json!([]))])).await.unwrap();

        let got = store.get(&[KEY_PRESETS, KEY_BLOCK_ELEMENTS]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[KEY_PRESETS], json!([]));
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe();

        store.set(record(&[(KEY_SETTINGS, json!({"theme": "dark"}))])).await.unwrap();
        store.remove(&[KEY_SETTINGS, KEY_TEMP_SELECTED]).await.unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.key, KEY_SETTINGS);
        assert_eq!(first.old_value, None);
        assert!(first.touches_collections());

        let second = rx.try_recv().unwrap();
        assert_eq!(second.new_value, None);
        // Removing an absent key is silent
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.get(&[KEY_PRESETS]).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.get(&[KEY_PRESETS]).await.is_ok());
    }
}
