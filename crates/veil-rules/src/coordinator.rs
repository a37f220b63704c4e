//! Background coordinator
//!
//! Routes control messages to the rule store, forwards picker commands to the
//! active tab and tells every tab when the rule collections change. The
//! coordinator owns the only [`RuleCache`].

use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

use veil_core::PickedElement;

use crate::cache::{RuleCache, RuleSnapshot};
use crate::error::{RuleError, ValidationError};
use crate::protocol::{Message, MessageType, Response};
use crate::rules::RuleStore;
use crate::store::{KeyValueStore, StorageChange};
use crate::validate::{BlockElementDraft, PresetDraft};

pub type TabId = i32;

/// A tab could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not deliver to tab {tab}: {reason}")]
pub struct DeliveryError {
    pub tab: TabId,
    pub reason: String,
}

/// Access to the browser's tabs.
#[async_trait(?Send)]
pub trait Tabs {
    /// The focused tab of the current window.
    async fn active_tab(&self) -> Option<TabId>;

    async fn all_tabs(&self) -> Vec<TabId>;

    /// Send `message` to one tab and wait for its reply.
    async fn send(&self, tab: TabId, message: &Message) -> Result<Value, DeliveryError>;
}

pub struct Coordinator<S, T> {
    rules: RuleStore<S>,
    tabs: T,
    cache: Mutex<RuleCache>,
}

impl<S: KeyValueStore, T: Tabs> Coordinator<S, T> {
    pub fn new(rules: RuleStore<S>, tabs: T) -> Self {
        Self {
            rules,
            tabs,
            cache: Mutex::new(RuleCache::new()),
        }
    }

    pub fn rules(&self) -> &RuleStore<S> {
        &self.rules
    }

    pub fn tabs(&self) -> &T {
        &self.tabs
    }

    // ===== Dispatch =====

    /// Handle a raw message as received from the runtime.
    pub async fn handle_value(&self, raw: &Value) -> Response {
        match Message::from_value(raw) {
            Some(message) => self.handle(&message).await,
            None => Response::unknown_type(),
        }
    }

    pub async fn handle(&self, message: &Message) -> Response {
        debug!("background received {}", message.kind.as_str());
        match self.dispatch(message).await {
            Ok(response) => response,
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn dispatch(&self, message: &Message) -> Result<Response, RuleError> {
        let response = match message.kind {
            MessageType::StartPicker | MessageType::StopPicker => self.forward_to_active_tab(message).await,

            MessageType::ElementSelected => {
                let picked: PickedElement = serde_json::from_value(message.payload().clone())
                    .map_err(|e| ValidationError::Payload(e.to_string()))?;
                self.rules.save_pending(&picked).await?;
                Response::ok()
            }

            MessageType::SaveBlockElement => {
                let draft = BlockElementDraft::from_payload(message.payload())?;
                let saved = self.rules.save_block_element(draft).await?;
                self.after_write().await;
                Response::with_data(&saved)
            }

            MessageType::DeleteBlockElement => {
                let id = required_id(message)?;
                let report = self.rules.delete_block_element(id).await?;
                self.after_write().await;
                Response::with_data(&report)
            }

            MessageType::GetBlockElements => Response::with_data(&self.snapshot().await.block_elements),

            MessageType::SavePreset => {
                let draft = PresetDraft::from_payload(message.payload())?;
                let saved = self.rules.save_preset(draft).await?;
                self.after_write().await;
                Response::with_data(&saved)
            }

            MessageType::DeletePreset => {
                let id = required_id(message)?;
                self.rules.delete_preset(id).await?;
                self.after_write().await;
                Response::ok()
            }

            MessageType::TogglePreset => {
                let id = required_id(message)?;
                let target = message.payload().get("enabled").and_then(Value::as_bool);
                let toggled = self.rules.toggle_preset(id, target).await?;
                self.after_write().await;
                Response::with_data(&toggled)
            }

            MessageType::GetPresets => Response::with_data(&self.snapshot().await.presets),

            MessageType::ApplyRules => {
                self.notify_all_tabs(&Message::new(MessageType::ApplyRules)).await;
                Response::ok()
            }

            MessageType::GetCurrentState => Response::with_data(&self.snapshot().await),

            // Broadcast only; never addressed to the background
            MessageType::StateUpdated => Response::unknown_type(),
        };
        Ok(response)
    }

    async fn forward_to_active_tab(&self, message: &Message) -> Response {
        let Some(tab) = self.tabs.active_tab().await else {
            return Response::error("No active tab");
        };
        match self.tabs.send(tab, message).await {
            Ok(_) => Response::ok(),
            Err(e) => Response::error(e.to_string()),
        }
    }

    // ===== Cache =====

    /// Current collections, served from the cache when warm.
    pub async fn snapshot(&self) -> RuleSnapshot {
        let cached = self
            .cache
            .lock()
            .ok()
            .map(|cache| (cache.get().cloned(), cache.generation()));
        let generation = match cached {
            Some((Some(snapshot), _)) => return snapshot,
            Some((None, generation)) => generation,
            None => return self.rules.snapshot().await,
        };

        let snapshot = self.rules.snapshot().await;
        if let Ok(mut cache) = self.cache.lock() {
            cache.fill(generation, snapshot.clone());
        }
        snapshot
    }

    pub fn invalidate_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.invalidate();
        }
    }

    pub fn is_cache_warm(&self) -> bool {
        self.cache.lock().map(|c| c.is_warm()).unwrap_or(false)
    }

    async fn after_write(&self) {
        self.invalidate_cache();
        self.notify_all_tabs(&Message::new(MessageType::StateUpdated)).await;
    }

    // ===== Broadcast =====

    /// Send `message` to every tab. Unreachable tabs are skipped.
    /// Returns how many tabs accepted it.
    pub async fn notify_all_tabs(&self, message: &Message) -> usize {
        let mut delivered = 0;
        for tab in self.tabs.all_tabs().await {
            match self.tabs.send(tab, message).await {
                Ok(_) => delivered += 1,
                Err(e) => warn!("{}", e),
            }
        }
        delivered
    }

    /// React to one change of the underlying store.
    pub async fn on_storage_changed(&self, change: &StorageChange) {
        if !change.touches_collections() {
            return;
        }
        self.invalidate_cache();
        self.notify_all_tabs(&Message::new(MessageType::StateUpdated)).await;
    }

    /// Follow the store's change stream until it closes.
    pub async fn watch_storage(&self) {
        let mut changes = self.rules.backend().subscribe();
        loop {
            match changes.recv().await {
                Ok(change) => self.on_storage_changed(&change).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("missed {} storage changes", skipped);
                    self.invalidate_cache();
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn required_id(message: &Message) -> Result<&str, ValidationError> {
    message
        .payload_id()
        .ok_or_else(|| ValidationError::Payload("id is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeTabs {
        active: Option<TabId>,
        open: Vec<TabId>,
        unreachable: Vec<TabId>,
        sent: RefCell<Vec<(TabId, MessageType)>>,
    }

    #[async_trait(?Send)]
    impl Tabs for FakeTabs {
        async fn active_tab(&self) -> Option<TabId> {
            self.active
        }

        async fn all_tabs(&self) -> Vec<TabId> {
            self.open.clone()
        }

        async fn send(&self, tab: TabId, message: &Message) -> Result<Value, DeliveryError> {
            if self.unreachable.contains(&tab) {
                return Err(DeliveryError {
                    tab,
                    reason: "Receiving end does not exist".to_string(),
                });
            }
            self.sent.borrow_mut().push((tab, message.kind));
            Ok(json!({"success": true}))
        }
    }

    fn coordinator(tabs: FakeTabs) -> Coordinator<MemoryStore, FakeTabs> {
        Coordinator::new(RuleStore::new(Arc::new(MemoryStore::new())), tabs)
    }

    fn save_element_message() -> Value {
        json!({
            "type": "SAVE_BLOCK_ELEMENT",
            "payload": {
                "name": "Sidebar",
                "selectors": ["#secondary"],
                "urlPattern": "youtube.com",
                "urlPatternType": "site_wide"
            }
        })
    }

    #[tokio::test]
    async fn test_picker_commands_need_an_active_tab() {
        let bg = coordinator(FakeTabs::default());
        let response = bg.handle_value(&json!({"type": "START_PICKER"})).await;
        assert_eq!(response, Response::error("No active tab"));

        let bg = coordinator(FakeTabs {
            active: Some(7),
            ..FakeTabs::default()
        });
        assert!(bg.handle_value(&json!({"type": "STOP_PICKER"})).await.success);
        assert_eq!(*bg.tabs().sent.borrow(), vec![(7, MessageType::StopPicker)]);
    }

    #[tokio::test]
    async fn test_save_broadcasts_despite_unreachable_tabs() {
        let bg = coordinator(FakeTabs {
            open: vec![1, 2, 3],
            unreachable: vec![2],
            ..FakeTabs::default()
        });
        let response = bg.handle_value(&save_element_message()).await;
        assert!(response.success);
        assert_eq!(response.data.unwrap()["name"], "Sidebar");
        assert_eq!(
            *bg.tabs().sent.borrow(),
            vec![(1, MessageType::StateUpdated), (3, MessageType::StateUpdated)]
        );
    }

    #[tokio::test]
    async fn test_validation_errors_are_reported() {
        let bg = coordinator(FakeTabs::default());
        let response = bg
            .handle_value(&json!({"type": "SAVE_BLOCK_ELEMENT", "payload": {"name": "x", "selectors": []}}))
            .await;
        assert_eq!(response, Response::error("At least one selector is required"));

        let response = bg
            .handle_value(&json!({"type": "TOGGLE_PRESET", "payload": {"id": "preset_missing"}}))
            .await;
        assert_eq!(response, Response::error("Preset not found"));
    }

    #[tokio::test]
    async fn test_unknown_message_type() {
        let bg = coordinator(FakeTabs::default());
        assert_eq!(bg.handle_value(&json!({"type": "NOPE"})).await, Response::unknown_type());
        assert_eq!(
            bg.handle(&Message::new(MessageType::StateUpdated)).await,
            Response::unknown_type()
        );
    }

    #[tokio::test]
    async fn test_current_state_and_cache_invalidation() {
        let bg = coordinator(FakeTabs::default());
        let state = bg.handle_value(&json!({"type": "GET_CURRENT_STATE"})).await;
        assert_eq!(state.data.unwrap()["blockElements"], json!([]));
        assert!(bg.is_cache_warm());

        bg.handle_value(&save_element_message()).await;
        assert!(!bg.is_cache_warm());

        let elements = bg.handle_value(&json!({"type": "GET_BLOCK_ELEMENTS"})).await;
        assert_eq!(elements.data.unwrap().as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_storage_change_invalidates_and_notifies() {
        let bg = coordinator(FakeTabs {
            open: vec![4],
            ..FakeTabs::default()
        });
        bg.snapshot().await;

        bg.on_storage_changed(&StorageChange {
            key: "veil_temp_selected".to_string(),
            old_value: None,
            new_value: Some(json!({})),
        })
        .await;
        assert!(bg.is_cache_warm());
        assert!(bg.tabs().sent.borrow().is_empty());

        bg.on_storage_changed(&StorageChange {
            key: "veil_presets".to_string(),
            old_value: None,
            new_value: Some(json!([])),
        })
        .await;
        assert!(!bg.is_cache_warm());
        assert_eq!(*bg.tabs().sent.borrow(), vec![(4, MessageType::StateUpdated)]);
    }

    #[tokio::test]
    async fn test_apply_rules_fans_out() {
        let bg = coordinator(FakeTabs {
            open: vec![1, 2],
            ..FakeTabs::default()
        });
        assert!(bg.handle_value(&json!({"type": "APPLY_RULES"})).await.success);
        assert_eq!(bg.tabs().sent.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_element_selected_fills_pending_slot() {
        let bg = coordinator(FakeTabs::default());
        let picked = json!({
            "selectors": ["#ad"],
            "description": "#ad",
            "tagName": "div",
            "url": "https://example.com/",
            "domain": "example.com",
            "pathPattern": "example.com/",
            "rect": {"x": 0.0, "y": 0.0, "width": 10.0, "height": 10.0}
        });
        let response = bg
            .handle_value(&json!({"type": "ELEMENT_SELECTED", "payload": picked}))
            .await;
        assert!(response.success);
        let pending = bg.rules().take_pending().await.unwrap().unwrap();
        assert_eq!(pending.selectors, vec!["#ad".to_string()]);
    }
}
