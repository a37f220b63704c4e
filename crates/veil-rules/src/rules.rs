//! Rule store adapter
//!
//! Typed access to the persisted collections over any [`KeyValueStore`].
//! Reads treat an unreachable store as empty and skip records that no longer
//! parse; writes validate first, keep those unreadable records, and never
//! leave a partial write behind.

use std::sync::Arc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use veil_core::{BlockElement, PickedElement, Preset, Settings};

use crate::cache::RuleSnapshot;
use crate::cascade::{cascade_delete, CascadeReport};
use crate::collection::{Collection, Keyed};
use crate::error::{RecordKind, RuleError, StoreError};
use crate::ids::{new_id, now_iso, BLOCK_ELEMENT_PREFIX, PRESET_PREFIX};
use crate::resolver::resolve;
use crate::store::{KeyValueStore, Record, KEY_BLOCK_ELEMENTS, KEY_PRESETS, KEY_SETTINGS, KEY_TEMP_SELECTED};
use crate::validate::{sanitize_name, validate_block_element, validate_preset, BlockElementDraft, PresetDraft};

pub struct RuleStore<S> {
    store: Arc<S>,
}

impl<S> Clone for RuleStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> RuleStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &S {
        &self.store
    }

    // ===== Loading =====

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut record = self.store.get(&[key]).await?;
        match record.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    async fn load_collection<T>(&self, key: &str) -> Result<Collection<T>, StoreError>
    where
        T: Keyed + Serialize + DeserializeOwned,
    {
        let mut record = self.store.get(&[key]).await?;
        Ok(Collection::from_stored(key, record.remove(key)))
    }

    async fn load_block_elements(&self) -> Result<Collection<BlockElement>, StoreError> {
        self.load_collection(KEY_BLOCK_ELEMENTS).await
    }

    async fn load_presets(&self) -> Result<Collection<Preset>, StoreError> {
        self.load_collection(KEY_PRESETS).await
    }

    async fn load_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.load(KEY_SETTINGS).await?.unwrap_or_default())
    }

    async fn write(&self, pairs: Vec<(&str, Value)>) -> Result<(), StoreError> {
        let record: Record = pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        self.store.set(record).await
    }

    fn to_value<T: Serialize>(value: &T) -> Result<Value, StoreError> {
        Ok(serde_json::to_value(value)?)
    }

    // ===== Reads =====

    pub async fn block_elements(&self) -> Vec<BlockElement> {
        match self.load_block_elements().await {
            Ok(elements) => elements.into_records(),
            Err(e) => {
                warn!("reading block elements: {}", e);
                Vec::new()
            }
        }
    }

    /// Presets, newest first.
    pub async fn presets(&self) -> Vec<Preset> {
        let mut presets = match self.load_presets().await {
            Ok(presets) => presets.into_records(),
            Err(e) => {
                warn!("reading presets: {}", e);
                Vec::new()
            }
        };
        presets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        presets
    }

    pub async fn settings(&self) -> Settings {
        self.load_settings().await.unwrap_or_else(|e| {
            warn!("reading settings: {}", e);
            Settings::default()
        })
    }

    pub async fn snapshot(&self) -> RuleSnapshot {
        RuleSnapshot {
            block_elements: self.block_elements().await,
            presets: self.presets().await,
            settings: self.settings().await,
        }
    }

    /// Block elements active on `current_url`.
    pub async fn active_block_elements(&self, current_url: &str) -> Vec<BlockElement> {
        let elements = self.block_elements().await;
        let presets = self.presets().await;
        resolve(&elements, &presets, current_url)
    }

    // ===== Block elements =====

    /// Create or update a block element. A draft whose id is unknown is stored
    /// as a new record with a fresh id.
    pub async fn save_block_element(&self, draft: BlockElementDraft) -> Result<BlockElement, RuleError> {
        let url_pattern_type = validate_block_element(&draft)?;
        let name = sanitize_name(&draft.name);
        let mut elements = self.load_block_elements().await?;
        let now = now_iso();

        let existing = draft.id.as_deref().and_then(|id| elements.get_mut(id));

        let saved = match existing {
            Some(element) => {
                element.name = name;
                element.selectors = draft.selectors;
                element.url_pattern = draft.url_pattern;
                element.url_pattern_type = url_pattern_type;
                element.updated_at = now;
                element.clone()
            }
            None => {
                let element = BlockElement {
                    id: new_id(BLOCK_ELEMENT_PREFIX),
                    name,
                    selectors: draft.selectors,
                    url_pattern: draft.url_pattern,
                    url_pattern_type,
                    created_at: now.clone(),
                    updated_at: now,
                };
                elements.push(element.clone());
                element
            }
        };

        self.write(vec![(KEY_BLOCK_ELEMENTS, elements.to_value()?)]).await?;
        debug!("saved block element {}", saved.id);
        Ok(saved)
    }

    /// Delete a block element and cascade into the presets referencing it.
    /// Both collections are written in one store operation.
    pub async fn delete_block_element(&self, id: &str) -> Result<CascadeReport, RuleError> {
        let mut elements = self.load_block_elements().await?;
        if !elements.remove(id) {
            return Err(RuleError::not_found(RecordKind::BlockElement, id));
        }

        let mut presets = self.load_presets().await?;
        let (kept, report) = cascade_delete(std::mem::take(presets.records_mut()), id, &now_iso());
        *presets.records_mut() = kept;

        let mut pairs = vec![(KEY_BLOCK_ELEMENTS, elements.to_value()?)];
        if !report.is_empty() {
            pairs.push((KEY_PRESETS, presets.to_value()?));
        }
        self.write(pairs).await.map_err(|source| {
            if report.is_empty() {
                RuleError::Store(source)
            } else {
                RuleError::Cascade {
                    id: id.to_string(),
                    source,
                }
            }
        })?;

        debug!(
            "deleted block element {}: {} presets updated, {} presets removed",
            id,
            report.updated.len(),
            report.deleted.len()
        );
        Ok(report)
    }

    // ===== Presets =====

    pub async fn save_preset(&self, draft: PresetDraft) -> Result<Preset, RuleError> {
        let elements = self.load_block_elements().await?;
        validate_preset(&draft, elements.records().iter().map(|e| e.id.as_str()))?;

        let mut presets = self.load_presets().await?;
        let now = now_iso();
        let name = draft.name.trim().to_string();

        let existing = draft.id.as_deref().and_then(|id| presets.get_mut(id));

        let saved = match existing {
            Some(preset) => {
                preset.name = name;
                preset.block_element_ids = draft.block_element_ids;
                if let Some(enabled) = draft.enabled {
                    preset.enabled = enabled;
                }
                if draft.icon.is_some() {
                    preset.icon = draft.icon;
                }
                preset.updated_at = now;
                preset.clone()
            }
            None => {
                let preset = Preset {
                    id: new_id(PRESET_PREFIX),
                    name,
                    block_element_ids: draft.block_element_ids,
                    enabled: draft.enabled.unwrap_or(false),
                    icon: draft.icon,
                    created_at: now.clone(),
                    updated_at: now,
                };
                presets.push(preset.clone());
                preset
            }
        };

        self.write(vec![(KEY_PRESETS, presets.to_value()?)]).await?;
        debug!("saved preset {}", saved.id);
        Ok(saved)
    }

    pub async fn delete_preset(&self, id: &str) -> Result<(), RuleError> {
        let mut presets = self.load_presets().await?;
        if !presets.remove(id) {
            return Err(RuleError::not_found(RecordKind::Preset, id));
        }
        self.write(vec![(KEY_PRESETS, presets.to_value()?)]).await?;
        Ok(())
    }

    /// Set `enabled` to `target`, or flip it when `target` is `None`.
    pub async fn toggle_preset(&self, id: &str, target: Option<bool>) -> Result<Preset, RuleError> {
        let mut presets = self.load_presets().await?;
        let preset = presets
            .get_mut(id)
            .ok_or_else(|| RuleError::not_found(RecordKind::Preset, id))?;
        preset.enabled = target.unwrap_or(!preset.enabled);
        preset.updated_at = now_iso();
        let toggled = preset.clone();

        self.write(vec![(KEY_PRESETS, presets.to_value()?)]).await?;
        debug!("preset {} enabled={}", toggled.id, toggled.enabled);
        Ok(toggled)
    }

    // ===== Settings =====

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), RuleError> {
        self.write(vec![(KEY_SETTINGS, Self::to_value(settings)?)]).await?;
        Ok(())
    }

    /// Write default settings and empty collections for any key not yet present.
    pub async fn ensure_defaults(&self) -> Result<(), RuleError> {
        let present = self.store.get(&[KEY_BLOCK_ELEMENTS, KEY_PRESETS, KEY_SETTINGS]).await?;
        let mut pairs = Vec::new();
        if !present.contains_key(KEY_BLOCK_ELEMENTS) {
            pairs.push((KEY_BLOCK_ELEMENTS, Value::Array(Vec::new())));
        }
        if !present.contains_key(KEY_PRESETS) {
            pairs.push((KEY_PRESETS, Value::Array(Vec::new())));
        }
        if !present.contains_key(KEY_SETTINGS) {
            pairs.push((KEY_SETTINGS, Self::to_value(&Settings::default())?));
        }
        if !pairs.is_empty() {
            self.write(pairs).await?;
        }
        Ok(())
    }

    // ===== Pending picked element =====

    pub async fn save_pending(&self, picked: &PickedElement) -> Result<(), RuleError> {
        self.write(vec![(KEY_TEMP_SELECTED, Self::to_value(picked)?)]).await?;
        Ok(())
    }

    /// Read and clear the pending slot.
    pub async fn take_pending(&self) -> Result<Option<PickedElement>, RuleError> {
        let pending = self.load(KEY_TEMP_SELECTED).await?;
        if pending.is_some() {
            self.store.remove(&[KEY_TEMP_SELECTED]).await?;
        }
        Ok(pending)
    }
}
