//! Stored record collections
//!
//! A collection is parsed record by record. Records that no longer parse are
//! skipped for reads but kept verbatim, so writing the collection back never
//! loses them and deleting one by id still works.

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use veil_core::{BlockElement, Preset};

use crate::error::StoreError;

/// Records addressed by their `id` field.
pub trait Keyed {
    fn id(&self) -> &str;
}

impl Keyed for BlockElement {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Keyed for Preset {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    records: Vec<T>,
    unreadable: Vec<Value>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            unreadable: Vec::new(),
        }
    }
}

impl<T: Keyed + Serialize + DeserializeOwned> Collection<T> {
    /// Parse the value stored under `key`. A missing or non-array value is an
    /// empty collection.
    pub fn from_stored(key: &str, value: Option<Value>) -> Self {
        let items = match value {
            None | Some(Value::Null) => return Self::default(),
            Some(Value::Array(items)) => items,
            Some(other) => {
                warn!("{} is not a list, ignoring {}", key, other);
                return Self::default();
            }
        };

        let mut collection = Self::default();
        for item in items {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(record) => collection.records.push(record),
                Err(e) => {
                    warn!("skipping unreadable record {} in {}: {}", raw_id(&item).unwrap_or("?"), key, e);
                    collection.unreadable.push(item);
                }
            }
        }
        collection
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<T> {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    pub fn unreadable(&self) -> &[Value] {
        &self.unreadable
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.records.iter_mut().find(|record| record.id() == id)
    }

    pub fn push(&mut self, record: T) {
        self.records.push(record);
    }

    /// Remove every record with `id`, readable or not. Returns whether any was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len() + self.unreadable.len();
        self.records.retain(|record| record.id() != id);
        self.unreadable.retain(|item| raw_id(item) != Some(id));
        self.records.len() + self.unreadable.len() != before
    }

    /// The stored form: readable records followed by the unreadable ones.
    pub fn to_value(&self) -> Result<Value, StoreError> {
        let mut items = Vec::with_capacity(self.records.len() + self.unreadable.len());
        for record in &self.records {
            items.push(serde_json::to_value(record)?);
        }
        items.extend(self.unreadable.iter().cloned());
        Ok(Value::Array(items))
    }
}

fn raw_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}
