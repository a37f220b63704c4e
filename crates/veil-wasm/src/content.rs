//! Content-script runtime: wires the controller to the page's events, the
//! mutation observer and the debounce timer.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use gloo::events::{EventListener, EventListenerOptions, EventListenerPhase};
use gloo::timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, Event, KeyboardEvent, MouseEvent};

use veil_core::{ClickOutcome, EngineConfig, MutationRecord, PageLocation, Picker, PickerHost};
use veil_rules::{ContentAction, ContentScript, Message, RuleStore};

use crate::chrome;
use crate::dom::WebDom;
use crate::storage::ChromeStore;

pub type Script = ContentScript<ChromeStore, WebPickerHost, Element>;

// =============================================================================
// Picker host
// =============================================================================

/// Installs the picker's capturing-phase listeners on the document.
pub struct WebPickerHost {
    document: Document,
    runtime: Weak<ContentRuntime>,
    listeners: Vec<EventListener>,
}

impl WebPickerHost {
    fn listen<F>(&mut self, event_type: &'static str, handler: F)
    where
        F: Fn(&ContentRuntime, &Event) + 'static,
    {
        let runtime = self.runtime.clone();
        let options = EventListenerOptions {
            phase: EventListenerPhase::Capture,
            passive: false,
        };
        let listener = EventListener::new_with_options(&self.document, event_type, options, move |event| {
            if let Some(runtime) = runtime.upgrade() {
                handler(&runtime, event);
            }
        });
        self.listeners.push(listener);
    }
}

impl PickerHost for WebPickerHost {
    fn attach_listeners(&mut self) {
        self.listen("mouseover", ContentRuntime::on_pointer_over);
        self.listen("click", ContentRuntime::on_click);
        self.listen("keydown", ContentRuntime::on_key_down);
    }

    fn detach_listeners(&mut self) {
        // Detaching usually happens inside one of these listeners; drop them
        // once the current event has finished dispatching.
        let listeners = std::mem::take(&mut self.listeners);
        spawn_local(async move { drop(listeners) });
    }
}

// =============================================================================
// Runtime
// =============================================================================

pub struct ContentRuntime {
    dom: RefCell<WebDom>,
    script: RefCell<Script>,
    timer: RefCell<Option<Timeout>>,
}

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

fn current_href() -> String {
    web_sys::window()
        .and_then(|w| w.location().href().ok())
        .unwrap_or_default()
}

impl ContentRuntime {
    pub fn new(document: Document, config: &EngineConfig) -> Result<Rc<Self>, wasm_bindgen::JsValue> {
        let rules = RuleStore::new(Arc::new(ChromeStore::connect()));
        let mut observer_error = None;
        let runtime = Rc::new_cyclic(|weak: &Weak<ContentRuntime>| {
            let mut dom = WebDom::new(document.clone());
            let on_records = weak.clone();
            if let Err(e) = dom.set_observer_callback(move |records| {
                if let Some(runtime) = on_records.upgrade() {
                    runtime.on_mutations(records);
                }
            }) {
                observer_error = Some(e);
            }

            let host = WebPickerHost {
                document,
                runtime: weak.clone(),
                listeners: Vec::new(),
            };
            ContentRuntime {
                dom: RefCell::new(dom),
                script: RefCell::new(ContentScript::new(rules, host, config)),
                timer: RefCell::new(None),
            }
        });
        match observer_error {
            Some(e) => Err(e),
            None => Ok(runtime),
        }
    }

    /// Start observing and apply the active rules once.
    pub fn start(self: &Rc<Self>) {
        let started = self.script.borrow_mut().start(&mut *self.dom.borrow_mut());
        if started {
            self.schedule_refresh();
        }
    }

    /// Resolve and reapply in the background.
    pub fn schedule_refresh(self: &Rc<Self>) {
        let runtime = Rc::clone(self);
        spawn_local(async move { runtime.refresh().await });
    }

    async fn refresh(&self) {
        let rules = self.script.borrow().rules().clone();
        let active = rules.active_block_elements(&current_href()).await;
        let report = self.script.borrow().apply(&mut *self.dom.borrow_mut(), &active);
        log::debug!("{} of {} rules unmatched", report.unmatched, report.rules);
    }

    /// Handle a message from the background; returns whether it was understood.
    pub fn handle_message(self: &Rc<Self>, message: &Message) -> bool {
        let action = self
            .script
            .borrow_mut()
            .handle_message(&mut *self.dom.borrow_mut(), message);
        match action {
            ContentAction::Reapply => {
                self.schedule_refresh();
                true
            }
            ContentAction::PickerStarted | ContentAction::PickerStopped => true,
            ContentAction::Ignored => false,
        }
    }

    // ===== Mutations =====

    fn on_mutations(self: Rc<Self>, records: Vec<MutationRecord<Element>>) {
        let deadline = {
            let dom = self.dom.borrow();
            self.script.borrow_mut().on_mutations(&*dom, &records, now_ms())
        };
        let Some(deadline) = deadline else {
            return;
        };

        let delay = deadline.saturating_sub(now_ms()) as u32;
        let runtime = Rc::downgrade(&self);
        // Replacing the previous timeout cancels it, so a firing timeout always
        // belongs to the latest quiet period
        *self.timer.borrow_mut() = Some(Timeout::new(delay, move || {
            let Some(runtime) = runtime.upgrade() else {
                return;
            };
            let due = runtime.script.borrow_mut().fire();
            if due {
                runtime.schedule_refresh();
            }
        }));
    }

    // ===== Picker events =====

    fn on_pointer_over(&self, event: &Event) {
        let Some(event) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        pointer_over(self.script.borrow_mut().picker_mut(), &mut self.dom.borrow_mut(), event);
    }

    fn on_click(&self, event: &Event) {
        event.prevent_default();
        event.stop_propagation();

        let target = event.target().and_then(|t| t.dyn_into::<Element>().ok());
        let location = match PageLocation::parse(&current_href()) {
            Ok(location) => location,
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        };
        let (outcome, message) = self
            .script
            .borrow_mut()
            .click(&mut *self.dom.borrow_mut(), target.as_ref(), &location);

        match outcome {
            ClickOutcome::Rejected(rejection) => {
                if let Some(window) = web_sys::window() {
                    let _ = window.alert_with_message(&rejection.to_string());
                }
            }
            ClickOutcome::Picked(_) => {
                if let Some(message) = message {
                    send_to_background(&message);
                }
            }
            ClickOutcome::Cancelled | ClickOutcome::Ignored => {}
        }
    }

    fn on_key_down(&self, event: &Event) {
        let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        let consumed = self
            .script
            .borrow_mut()
            .picker_mut()
            .key_down(&mut *self.dom.borrow_mut(), &event.key());
        if consumed {
            event.prevent_default();
        }
    }
}

/// Highlight the hovered element. A hover the picker takes does not reach the
/// page's own handlers.
fn pointer_over<H: PickerHost>(picker: &mut Picker<H, Element>, dom: &mut WebDom, event: &MouseEvent) -> bool {
    let target = event.target().and_then(|t| t.dyn_into::<Element>().ok());
    let x = f64::from(event.client_x());
    let y = f64::from(event.client_y());
    let consumed = picker.hover(dom, target.as_ref(), x, y);
    if consumed {
        event.stop_propagation();
    }
    consumed
}

fn send_to_background(message: &Message) {
    let payload = match chrome::to_js(&message.to_value()) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("encoding {}: {}", message.kind.as_str(), e);
            return;
        }
    };
    match chrome::runtime_send_message(&payload) {
        Ok(promise) => spawn_local(async move {
            if let Err(e) = wasm_bindgen_futures::JsFuture::from(promise).await {
                log::warn!("background unreachable: {}", chrome::describe(&e));
            }
        }),
        Err(e) => log::warn!("background unreachable: {}", chrome::describe(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use wasm_bindgen_test::*;
    use web_sys::MouseEventInit;

    wasm_bindgen_test_configure!(run_in_browser);

    struct NoListeners;

    impl PickerHost for NoListeners {
        fn attach_listeners(&mut self) {}
        fn detach_listeners(&mut self) {}
    }

    fn mouseover() -> MouseEvent {
        let init = MouseEventInit::new();
        init.set_bubbles(true);
        MouseEvent::new_with_mouse_event_init_dict("mouseover", &init).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_picker_hover_stops_page_handlers() {
        let dom = WebDom::current().unwrap();
        let document = dom.document().clone();
        let body = document.body().unwrap();
        let card = document.create_element("div").unwrap();
        card.set_id("hover-card");
        body.append_child(&card).unwrap();

        let page_hovers = Rc::new(Cell::new(0));
        let counter = Rc::clone(&page_hovers);
        let _page = EventListener::new(&body, "mouseover", move |_| counter.set(counter.get() + 1));

        let state = Rc::new(RefCell::new((Picker::new(NoListeners, &EngineConfig::default()), dom)));
        let shared = Rc::clone(&state);
        let options = EventListenerOptions {
            phase: EventListenerPhase::Capture,
            passive: false,
        };
        let _picker = EventListener::new_with_options(&document, "mouseover", options, move |event| {
            let mut guard = shared.borrow_mut();
            let (picker, dom) = &mut *guard;
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                pointer_over(picker, dom, event);
            }
        });

        {
            let mut guard = state.borrow_mut();
            let (picker, dom) = &mut *guard;
            picker.start(dom);
        }
        card.dispatch_event(&mouseover()).unwrap();
        assert_eq!(page_hovers.get(), 0);
        assert!(card.class_list().contains("veil-picker-highlight"));

        {
            let mut guard = state.borrow_mut();
            let (picker, dom) = &mut *guard;
            picker.stop(dom);
        }
        card.dispatch_event(&mouseover()).unwrap();
        assert_eq!(page_hovers.get(), 1);
        card.remove();
    }
}
