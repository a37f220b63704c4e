//! Load static HTML into the in-memory document.

use scraper::{ElementRef, Html, Node};

use veil_core::{Dom, MemoryDom, NodeId};

/// Parse `text` as a full document. `<head>` and `<body>` children land under
/// the corresponding elements of the returned document.
pub fn load_document(text: &str) -> MemoryDom {
    let html = Html::parse_document(text);
    let mut dom = MemoryDom::new();
    let root = html.root_element();

    for (name, value) in root.value().attrs() {
        let node = dom.root();
        dom.set_attribute(&node, name, value);
    }
    for section in root.children().filter_map(ElementRef::wrap) {
        let target = match section.value().name() {
            "head" => dom.head(),
            "body" => dom.body_id(),
            _ => continue,
        };
        for (name, value) in section.value().attrs() {
            dom.set_attribute(&target, name, value);
        }
        copy_children(&mut dom, section, target);
    }
    dom
}

fn copy_children(dom: &mut MemoryDom, source: ElementRef, target: NodeId) {
    let own_text: String = source
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(String::from(&**text)),
            _ => None,
        })
        .collect();
    let own_text = own_text.trim();
    if !own_text.is_empty() {
        dom.set_text_content(&target, own_text);
    }

    for child in source.children().filter_map(ElementRef::wrap) {
        let attrs: Vec<(&str, &str)> = child.value().attrs().collect();
        let node = dom.append_element(target, child.value().name(), &attrs);
        copy_children(dom, child, node);
    }
}
