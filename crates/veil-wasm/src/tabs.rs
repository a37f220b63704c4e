//! `chrome.tabs` access for the background coordinator.

use async_trait::async_trait;
use serde_json::{json, Value};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;

use veil_rules::{DeliveryError, Message, TabId, Tabs};

use crate::chrome;

pub struct ChromeTabs;

impl ChromeTabs {
    async fn query(&self, filter: Value) -> Vec<TabId> {
        let Ok(filter) = chrome::to_js(&filter) else {
            return Vec::new();
        };
        let promise = match chrome::tabs_query(&filter) {
            Ok(promise) => promise,
            Err(e) => {
                log::warn!("tabs.query failed: {}", chrome::describe(&e));
                return Vec::new();
            }
        };
        let tabs = match JsFuture::from(promise).await {
            Ok(tabs) => tabs,
            Err(e) => {
                log::warn!("tabs.query failed: {}", chrome::describe(&e));
                return Vec::new();
            }
        };
        js_sys::Array::from(&tabs)
            .iter()
            .filter_map(|tab| js_sys::Reflect::get(&tab, &"id".into()).ok())
            .filter_map(|id| id.as_f64())
            .map(|id| id as TabId)
            .collect()
    }
}

#[async_trait(?Send)]
impl Tabs for ChromeTabs {
    async fn active_tab(&self) -> Option<TabId> {
        self.query(json!({"active": true, "currentWindow": true})).await.into_iter().next()
    }

    async fn all_tabs(&self) -> Vec<TabId> {
        self.query(json!({})).await
    }

    async fn send(&self, tab: TabId, message: &Message) -> Result<Value, DeliveryError> {
        let fail = |e: &JsValue| DeliveryError {
            tab,
            reason: chrome::describe(e),
        };
        let payload = chrome::to_js(&message.to_value()).map_err(|reason| DeliveryError { tab, reason })?;
        let promise = chrome::tabs_send_message(tab, &payload).map_err(|e| fail(&e))?;
        let reply = JsFuture::from(promise).await.map_err(|e| fail(&e))?;
        chrome::to_json(&reply).map_err(|reason| DeliveryError { tab, reason })
    }
}
