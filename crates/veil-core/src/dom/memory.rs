//! Arena-backed in-memory document.
//!
//! Nodes live in a flat `Vec` and are addressed by [`NodeId`]. Detached nodes
//! stay in the arena; they simply stop being reachable from the root.

use super::{Dom, MutationRecord, MutationSource, ObserveOptions};
use crate::selector::{SelectorError, SelectorList};
use crate::types::ElementRect;

/// Index of a node in a [`MemoryDom`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeData {
    pub(crate) tag: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) text: String,
    style: Vec<(String, String)>,
    rect: ElementRect,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Created by another document (nested browsing context)
    foreign: bool,
}

/// In-memory document with `<html>`, `<head>` and `<body>`.
#[derive(Debug, Clone)]
pub struct MemoryDom {
    nodes: Vec<NodeData>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    observing: Option<ObserveOptions>,
    records: Vec<MutationRecord<NodeId>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            observing: None,
            records: Vec::new(),
        };
        dom.root = dom.alloc("html", false);
        dom.head = dom.alloc("head", false);
        dom.body = dom.alloc("body", false);
        dom.link(dom.root, dom.head);
        dom.link(dom.root, dom.body);
        dom
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body_id(&self) -> NodeId {
        self.body
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ===== Building =====

    /// Create an element with attributes and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let node = self.alloc(tag, false);
        self.nodes[node.index()].attrs = attrs
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
            .collect();
        self.append_child(&parent, &node);
        node
    }

    /// Create an element owned by another document. It is never attached here.
    pub fn create_foreign_element(&mut self, tag: &str) -> NodeId {
        self.alloc(tag, true)
    }

    pub fn set_rect(&mut self, node: NodeId, rect: ElementRect) {
        if let Some(data) = self.nodes.get_mut(node.index()) {
            data.rect = rect;
        }
    }

    /// Inline style property previously set with [`Dom::set_style`].
    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.data(node)?
            .style
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.as_str())
    }

    /// Whether the node is reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.is_within(node, self.root)
    }

    // ===== Mutation Records =====

    /// Drain queued mutation records, as an observer callback would receive them.
    pub fn take_records(&mut self) -> Vec<MutationRecord<NodeId>> {
        std::mem::take(&mut self.records)
    }

    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    // ===== Internals =====

    fn alloc(&mut self, tag: &str, foreign: bool) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            tag: tag.to_ascii_lowercase(),
            foreign,
            ..NodeData::default()
        });
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    pub(crate) fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.index())
    }

    fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.data(id).and_then(|d| d.parent);
        }
        false
    }

    fn should_record(&self, target: NodeId, flag: ObserveOptions) -> bool {
        let Some(options) = self.observing else {
            return false;
        };
        if !options.contains(flag) {
            return false;
        }
        if options.contains(ObserveOptions::SUBTREE) {
            self.is_within(target, self.body)
        } else {
            target == self.body
        }
    }

    fn record_attribute(&mut self, target: NodeId, name: &str, old_value: Option<String>) {
        if !self.should_record(target, ObserveOptions::ATTRIBUTES) {
            return;
        }
        let keep_old = self
            .observing
            .is_some_and(|o| o.contains(ObserveOptions::ATTRIBUTE_OLD_VALUE));
        self.records.push(MutationRecord::Attributes {
            target,
            name: name.to_string(),
            old_value: if keep_old { old_value } else { None },
        });
    }

    fn record_child_list(&mut self, target: NodeId, added: usize, removed: usize) {
        if self.should_record(target, ObserveOptions::CHILD_LIST) {
            self.records.push(MutationRecord::ChildList { target, added, removed });
        }
    }

    fn write_attribute(&mut self, node: NodeId, name: &str, value: String) -> Option<String> {
        let data = self.nodes.get_mut(node.index())?;
        match data.attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                data.attrs.push((name.to_string(), value));
                None
            }
        }
    }

    fn update_classes(&mut self, node: NodeId, edit: impl FnOnce(&mut Vec<String>)) {
        let mut classes = self.class_list(&node);
        edit(&mut classes);
        let old = self.write_attribute(node, "class", classes.join(" "));
        // classList edits always queue a record, even when nothing changed
        self.record_attribute(node, "class", old);
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn document_element(&self) -> Option<NodeId> {
        Some(self.root)
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn owns(&self, node: &NodeId) -> bool {
        self.data(*node).is_some_and(|d| !d.foreign)
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.data(*node)?.parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.data(*node).map(|d| d.children.clone()).unwrap_or_default()
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.data(*node).map(|d| d.tag.clone()).unwrap_or_default()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.data(*node)?
            .attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        self.data(*node).map(|d| d.attrs.clone()).unwrap_or_default()
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if self.data(*node).is_none() {
            return;
        }
        let old = self.write_attribute(*node, &name, value.to_string());
        self.record_attribute(*node, &name, old);
    }

    fn add_class(&mut self, node: &NodeId, class: &str) {
        self.update_classes(*node, |classes| {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.to_string());
            }
        });
    }

    fn remove_class(&mut self, node: &NodeId, class: &str) {
        self.update_classes(*node, |classes| classes.retain(|c| c != class));
    }

    fn text_content(&self, node: &NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![*node];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.data(id) {
                out.push_str(&data.text);
                stack.extend(data.children.iter().rev());
            }
        }
        out
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) {
        let Some(data) = self.nodes.get_mut(node.index()) else {
            return;
        };
        let removed = data.children.len() + usize::from(!data.text.is_empty());
        for child in std::mem::take(&mut data.children) {
            self.nodes[child.index()].parent = None;
        }
        self.nodes[node.index()].text = text.to_string();
        self.record_child_list(*node, usize::from(!text.is_empty()), removed);
    }

    fn set_style(&mut self, node: &NodeId, property: &str, value: &str) {
        let Some(data) = self.nodes.get_mut(node.index()) else {
            return;
        };
        match data.style.iter_mut().find(|(name, _)| name == property) {
            Some((_, existing)) => *existing = value.to_string(),
            None => data.style.push((property.to_string(), value.to_string())),
        }
        let rendered = data
            .style
            .iter()
            .map(|(name, value)| format!("{}: {};", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        let old = self.write_attribute(*node, "style", rendered);
        self.record_attribute(*node, "style", old);
    }

    fn bounding_box(&self, node: &NodeId) -> ElementRect {
        self.data(*node).map(|d| d.rect).unwrap_or_default()
    }

    fn create_element(&mut self, tag: &str) -> Option<NodeId> {
        Some(self.alloc(tag, false))
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        if self.data(*parent).is_none() || self.data(*child).is_none() || self.is_within(*parent, *child) {
            return;
        }
        self.remove_node(child);
        self.link(*parent, *child);
        self.record_child_list(*parent, 1, 0);
    }

    fn remove_node(&mut self, node: &NodeId) {
        let Some(parent) = self.data(*node).and_then(|d| d.parent) else {
            return;
        };
        self.nodes[parent.index()].children.retain(|c| c != node);
        self.nodes[node.index()].parent = None;
        self.record_child_list(parent, 0, 1);
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        Ok(SelectorList::parse(selector)?.query_all(self))
    }
}

impl MutationSource for MemoryDom {
    fn observe(&mut self, options: ObserveOptions) {
        self.observing = Some(options);
    }

    fn disconnect(&mut self) {
        self.observing = None;
        self.records.clear();
    }

    fn observed(&self) -> Option<ObserveOptions> {
        self.observing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_shape() {
        let dom = MemoryDom::new();
        assert_eq!(dom.tag_name(&dom.root()), "html");
        assert_eq!(dom.children(&dom.root()), vec![dom.head(), dom.body_id()]);
        assert_eq!(dom.parent(&dom.body_id()), Some(dom.root()));
    }

    #[test]
    fn test_append_and_remove() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let div = dom.append_element(body, "DIV", &[("ID", "main")]);
        assert_eq!(dom.tag_name(&div), "div");
        assert_eq!(dom.attribute(&div, "id").as_deref(), Some("main"));
        assert!(dom.is_attached(div));

        dom.remove_node(&div);
        assert!(!dom.is_attached(div));
        assert!(dom.children(&body).is_empty());
    }

    #[test]
    fn test_class_edits() {
        let mut dom = MemoryDom::new();
        let div = dom.append_element(dom.body_id(), "div", &[("class", "a  b")]);
        dom.add_class(&div, "c");
        dom.add_class(&div, "a");
        assert_eq!(dom.class_list(&div), vec!["a", "b", "c"]);
        dom.remove_class(&div, "b");
        assert_eq!(dom.attribute(&div, "class").as_deref(), Some("a c"));
        assert!(dom.has_class(&div, "c"));
    }

    #[test]
    fn test_records_only_while_observing() {
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        dom.append_element(body, "p", &[]);
        assert_eq!(dom.pending_records(), 0);

        dom.observe(ObserveOptions::STANDARD);
        let div = dom.append_element(body, "div", &[("class", "x")]);
        dom.add_class(&div, "y");
        let records = dom.take_records();
        assert_eq!(
            records,
            vec![
                MutationRecord::ChildList { target: body, added: 1, removed: 0 },
                MutationRecord::Attributes {
                    target: div,
                    name: "class".to_string(),
                    old_value: Some("x".to_string()),
                },
            ]
        );

        dom.add_class(&div, "z");
        dom.disconnect();
        assert_eq!(dom.pending_records(), 0);
        dom.add_class(&div, "w");
        assert_eq!(dom.pending_records(), 0);
    }

    #[test]
    fn test_head_changes_are_not_observed() {
        let mut dom = MemoryDom::new();
        dom.observe(ObserveOptions::STANDARD);
        let head = dom.head();
        dom.append_element(head, "style", &[]);
        assert_eq!(dom.pending_records(), 0);
    }

    #[test]
    fn test_old_value_requires_flag() {
        let mut dom = MemoryDom::new();
        let div = dom.append_element(dom.body_id(), "div", &[("class", "x")]);
        dom.observe(ObserveOptions::ATTRIBUTES | ObserveOptions::SUBTREE);
        dom.add_class(&div, "y");
        assert_eq!(
            dom.take_records(),
            vec![MutationRecord::Attributes {
                target: div,
                name: "class".to_string(),
                old_value: None,
            }]
        );
    }

    #[test]
    fn test_foreign_elements() {
        let mut dom = MemoryDom::new();
        let foreign = dom.create_foreign_element("button");
        let local = dom.create_element("button").unwrap();
        assert!(!dom.owns(&foreign));
        assert!(dom.owns(&local));
    }

    #[test]
    fn test_text_content_and_style() {
        let mut dom = MemoryDom::new();
        let div = dom.append_element(dom.body_id(), "div", &[]);
        let span = dom.append_element(div, "span", &[]);
        dom.set_text_content(&span, "hello");
        assert_eq!(dom.text_content(&div), "hello");

        dom.set_style(&div, "left", "10px");
        dom.set_style(&div, "top", "4px");
        dom.set_style(&div, "left", "12px");
        assert_eq!(dom.style(div, "left"), Some("12px"));
        assert_eq!(dom.attribute(&div, "style").as_deref(), Some("left: 12px; top: 4px;"));
    }

    #[test]
    fn test_append_rejects_cycles() {
        let mut dom = MemoryDom::new();
        let outer = dom.append_element(dom.body_id(), "div", &[]);
        let inner = dom.append_element(outer, "div", &[]);
        dom.append_child(&inner, &outer);
        assert_eq!(dom.parent(&outer), Some(dom.body_id()));
    }
}
