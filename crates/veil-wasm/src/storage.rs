//! `chrome.storage.local` as a key-value store.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use veil_rules::{KeyValueStore, Record, StorageChange, StoreError};

use crate::chrome;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

pub struct ChromeStore {
    changes: broadcast::Sender<StorageChange>,
    _listener: Closure<dyn FnMut(JsValue, JsValue)>,
}

impl ChromeStore {
    /// Connect to the local storage area and start forwarding its changes.
    pub fn connect() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let sender = changes.clone();
        let listener: Closure<dyn FnMut(JsValue, JsValue)> = Closure::new(move |raw: JsValue, area: JsValue| {
            if area.as_string().as_deref() != Some("local") {
                return;
            }
            let Ok(Value::Object(entries)) = chrome::to_json(&raw) else {
                return;
            };
            for (key, change) in entries {
                let _ = sender.send(StorageChange {
                    key,
                    old_value: change.get("oldValue").cloned(),
                    new_value: change.get("newValue").cloned(),
                });
            }
        });
        chrome::storage_on_changed(listener.as_ref().unchecked_ref());
        Self {
            changes,
            _listener: listener,
        }
    }
}

fn unavailable(e: JsValue) -> StoreError {
    StoreError::Unavailable(chrome::describe(&e))
}

fn key_array(keys: &[&str]) -> js_sys::Array {
    keys.iter().map(|key| JsValue::from_str(key)).collect()
}

async fn settle(promise: Result<js_sys::Promise, JsValue>) -> Result<JsValue, StoreError> {
    JsFuture::from(promise.map_err(unavailable)?).await.map_err(unavailable)
}

#[async_trait(?Send)]
impl KeyValueStore for ChromeStore {
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        let result = settle(chrome::storage_get(&key_array(keys))).await?;
        match chrome::to_json(&result).map_err(StoreError::Serialization)? {
            Value::Object(record) => Ok(record),
            Value::Null => Ok(Record::new()),
            other => Err(StoreError::Serialization(format!("expected an object, got {}", other))),
        }
    }

    async fn set(&self, items: Record) -> Result<(), StoreError> {
        let items = chrome::to_js(&Value::Object(items)).map_err(StoreError::Serialization)?;
        settle(chrome::storage_set(&items)).await?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        settle(chrome::storage_remove(&key_array(keys))).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}
