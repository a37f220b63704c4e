//! `web-sys` implementation of the document abstraction.

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, MutationObserver, MutationObserverInit};

use veil_core::{Dom, ElementRect, MutationRecord, MutationSource, ObserveOptions, SelectorError};

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

/// The live page document, optionally with a mutation observer on its body.
pub struct WebDom {
    document: Document,
    observer: Option<(MutationObserver, ObserverCallback)>,
    observed: Option<ObserveOptions>,
}

impl WebDom {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            observer: None,
            observed: None,
        }
    }

    /// The current window's document.
    pub fn current() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self::new(document))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Route observed records to `on_records`. Takes effect on the next
    /// [`MutationSource::observe`].
    pub fn set_observer_callback<F>(&mut self, mut on_records: F) -> Result<(), wasm_bindgen::JsValue>
    where
        F: FnMut(Vec<MutationRecord<Element>>) + 'static,
    {
        let callback: ObserverCallback = Closure::new(move |records: js_sys::Array, _: MutationObserver| {
            let converted: Vec<MutationRecord<Element>> = records
                .iter()
                .filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
                .filter_map(|record| convert_record(&record))
                .collect();
            if !converted.is_empty() {
                on_records(converted);
            }
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        if let Some((previous, _)) = self.observer.replace((observer, callback)) {
            previous.disconnect();
        }
        Ok(())
    }
}

fn convert_record(record: &web_sys::MutationRecord) -> Option<MutationRecord<Element>> {
    let target = record.target()?.dyn_into::<Element>().ok()?;
    match record.type_().as_str() {
        "childList" => Some(MutationRecord::ChildList {
            target,
            added: record.added_nodes().length() as usize,
            removed: record.removed_nodes().length() as usize,
        }),
        "attributes" => Some(MutationRecord::Attributes {
            target,
            name: record.attribute_name()?,
            old_value: record.old_value(),
        }),
        _ => None,
    }
}

impl Dom for WebDom {
    type Node = Element;

    fn document_element(&self) -> Option<Element> {
        self.document.document_element()
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn owns(&self, node: &Element) -> bool {
        node.owner_document().as_ref() == Some(&self.document)
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn children(&self, node: &Element) -> Vec<Element> {
        let children = node.children();
        (0..children.length()).filter_map(|i| children.item(i)).collect()
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_lowercase()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn attributes(&self, node: &Element) -> Vec<(String, String)> {
        node.get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .filter_map(|name| node.get_attribute(&name).map(|value| (name, value)))
            .collect()
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) {
        let _ = node.set_attribute(name, value);
    }

    fn add_class(&mut self, node: &Element, class: &str) {
        let _ = node.class_list().add_1(class);
    }

    fn remove_class(&mut self, node: &Element, class: &str) {
        let _ = node.class_list().remove_1(class);
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text_content(&mut self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn set_style(&mut self, node: &Element, property: &str, value: &str) {
        if let Some(element) = node.dyn_ref::<HtmlElement>() {
            let _ = element.style().set_property(property, value);
        }
    }

    fn bounding_box(&self, node: &Element) -> ElementRect {
        let rect = node.get_bounding_client_rect();
        ElementRect {
            x: rect.x(),
            y: rect.y(),
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn create_element(&mut self, tag: &str) -> Option<Element> {
        self.document.create_element(tag).ok()
    }

    fn append_child(&mut self, parent: &Element, child: &Element) {
        let _ = parent.append_child(child);
    }

    fn remove_node(&mut self, node: &Element) {
        node.remove();
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|e| SelectorError::Syntax {
                selector: selector.to_string(),
                reason: e.as_string().unwrap_or_else(|| "rejected by the browser".to_string()),
            })?;
        Ok((0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect())
    }
}

impl MutationSource for WebDom {
    fn observe(&mut self, options: ObserveOptions) {
        self.observed = Some(options);
        let (Some((observer, _)), Some(body)) = (self.observer.as_ref(), self.document.body()) else {
            return;
        };

        let init = MutationObserverInit::new();
        init.set_child_list(options.contains(ObserveOptions::CHILD_LIST));
        init.set_subtree(options.contains(ObserveOptions::SUBTREE));
        init.set_attributes(options.contains(ObserveOptions::ATTRIBUTES));
        init.set_attribute_old_value(options.contains(ObserveOptions::ATTRIBUTE_OLD_VALUE));
        if let Err(e) = observer.observe_with_options(&body, &init) {
            log::warn!("observe failed: {:?}", e);
            self.observed = None;
        }
    }

    fn disconnect(&mut self) {
        if let Some((observer, _)) = self.observer.as_ref() {
            observer.disconnect();
        }
        self.observed = None;
    }

    fn observed(&self) -> Option<ObserveOptions> {
        self.observed
    }
}
