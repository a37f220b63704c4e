//! Background service worker entry point.

use std::rc::Rc;
use std::sync::Arc;

use js_sys::Promise;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use veil_rules::{Coordinator, RuleStore};

use crate::chrome;
use crate::storage::ChromeStore;
use crate::tabs::ChromeTabs;

type BackgroundCoordinator = Coordinator<ChromeStore, ChromeTabs>;

/// Routes runtime messages. Construct once per service worker and call
/// `handleMessage` from `chrome.runtime.onMessage`, returning `true` from the
/// listener so the reply can arrive asynchronously.
#[wasm_bindgen]
pub struct Background {
    inner: Rc<BackgroundCoordinator>,
}

#[wasm_bindgen]
impl Background {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Background {
        let rules = RuleStore::new(Arc::new(ChromeStore::connect()));
        let inner = Rc::new(Coordinator::new(rules, ChromeTabs));

        let watcher = Rc::clone(&inner);
        spawn_local(async move { watcher.watch_storage().await });

        Background { inner }
    }

    /// Resolve to `{success, data?, error?}` for one message.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, message: JsValue) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            let response = match chrome::to_json(&message) {
                Ok(raw) => inner.handle_value(&raw).await,
                Err(e) => veil_rules::Response::error(e),
            };
            chrome::to_js(&response.to_value()).map_err(|e| JsValue::from_str(&e))
        })
    }

    /// Seed default settings and empty collections on install.
    #[wasm_bindgen(js_name = onInstalled)]
    pub fn on_installed(&self) -> Promise {
        let inner = Rc::clone(&self.inner);
        future_to_promise(async move {
            inner
                .rules()
                .ensure_defaults()
                .await
                .map(|_| JsValue::UNDEFINED)
                .map_err(|e| JsValue::from_str(&e.to_string()))
        })
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::new()
    }
}
