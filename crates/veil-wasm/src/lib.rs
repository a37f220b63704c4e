//! WebAssembly bindings for Veil
//!
//! Two entry points share this module: the content script (`initContent`,
//! `handleContentMessage`, the picker controls) and the background service
//! worker (the [`Background`] class).

mod background;
mod chrome;
mod content;
mod dom;
mod logger;
mod storage;
mod tabs;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use veil_core::{pattern, EngineConfig, SelectorGenerator};
use veil_rules::{Message, MessageType, Response};

pub use background::Background;
pub use content::ContentRuntime;
pub use dom::WebDom;
pub use storage::ChromeStore;
pub use tabs::ChromeTabs;

thread_local! {
    static CONTENT: RefCell<Option<Rc<ContentRuntime>>> = const { RefCell::new(None) };
}

fn content_runtime() -> Option<Rc<ContentRuntime>> {
    CONTENT.with(|slot| slot.borrow().clone())
}

/// Install the console logger at `level` (`error`, `warn`, `info`, `debug`, `trace`).
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: Option<String>) {
    logger::init(logger::parse_level(level.as_deref()));
}

// =============================================================================
// Content script
// =============================================================================

/// Start the content script on the current page. Idempotent.
#[wasm_bindgen(js_name = initContent)]
pub fn init_content(config_json: Option<String>) -> Result<(), JsValue> {
    if content_runtime().is_some() {
        return Ok(());
    }

    let config = match config_json {
        Some(text) => EngineConfig::from_json(&text).map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?,
        None => EngineConfig::default(),
    };
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("No document"))?;

    let runtime = ContentRuntime::new(document, &config)?;
    runtime.start();
    CONTENT.with(|slot| *slot.borrow_mut() = Some(runtime));
    Ok(())
}

/// Handle a message from the background and return the reply.
#[wasm_bindgen(js_name = handleContentMessage)]
pub fn handle_content_message(message: JsValue) -> JsValue {
    let response = match (content_runtime(), chrome::to_json(&message)) {
        (None, _) => Response::error("Content script not initialized"),
        (Some(_), Err(e)) => Response::error(e),
        (Some(runtime), Ok(raw)) => {
            let understood = Message::from_value(&raw).is_some_and(|message| runtime.handle_message(&message));
            if understood {
                Response::ok()
            } else {
                Response::unknown_type()
            }
        }
    };
    chrome::to_js(&response.to_value()).unwrap_or(JsValue::NULL)
}

fn send_local(kind: MessageType) -> Result<(), JsValue> {
    let runtime = content_runtime().ok_or_else(|| JsValue::from_str("Content script not initialized"))?;
    runtime.handle_message(&Message::new(kind));
    Ok(())
}

#[wasm_bindgen(js_name = applyRules)]
pub fn apply_rules() -> Result<(), JsValue> {
    send_local(MessageType::ApplyRules)
}

#[wasm_bindgen(js_name = startPicker)]
pub fn start_picker() -> Result<(), JsValue> {
    send_local(MessageType::StartPicker)
}

#[wasm_bindgen(js_name = stopPicker)]
pub fn stop_picker() -> Result<(), JsValue> {
    send_local(MessageType::StopPicker)
}

// =============================================================================
// Utilities
// =============================================================================

#[wasm_bindgen(js_name = matchUrlPattern)]
pub fn match_url_pattern(url: &str, url_pattern: &str, url_pattern_type: &str) -> Result<bool, JsValue> {
    pattern::matches_str(url, url_pattern, url_pattern_type).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Unique selector for `element` in the current document.
#[wasm_bindgen(js_name = generateSelector)]
pub fn generate_selector(element: web_sys::Element) -> Result<String, JsValue> {
    let dom = WebDom::current().ok_or_else(|| JsValue::from_str("No document"))?;
    SelectorGenerator::default()
        .generate(&dom, &element)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
