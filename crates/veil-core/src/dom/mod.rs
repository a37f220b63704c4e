//! Document abstraction
//!
//! The engine never touches a concrete DOM. Everything it needs from the live
//! document goes through [`Dom`]; mutation observation goes through
//! [`MutationSource`]. `veil-wasm` implements both over `web-sys`, and
//! [`MemoryDom`] implements them over an arena for the CLI and the tests.

pub(crate) mod memory;

pub use memory::{MemoryDom, NodeId};

use std::fmt;

use crate::selector::SelectorError;
use crate::types::ElementRect;

// =============================================================================
// Dom
// =============================================================================

/// Element-level access to a live document.
pub trait Dom {
    /// Element handle. Cheap to clone.
    type Node: Clone + PartialEq + fmt::Debug;

    /// The root (`<html>`) element.
    fn document_element(&self) -> Option<Self::Node>;

    fn body(&self) -> Option<Self::Node>;

    /// Whether the node belongs to this document rather than a nested browsing
    /// context.
    fn owns(&self, node: &Self::Node) -> bool;

    /// Parent element, if any.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Child elements in document order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Lowercase tag name.
    fn tag_name(&self, node: &Self::Node) -> String;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// All attributes in source order.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn add_class(&mut self, node: &Self::Node, class: &str);

    fn remove_class(&mut self, node: &Self::Node, class: &str);

    fn text_content(&self, node: &Self::Node) -> String;

    fn set_text_content(&mut self, node: &Self::Node, text: &str);

    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str);

    fn bounding_box(&self, node: &Self::Node) -> ElementRect;

    fn create_element(&mut self, tag: &str) -> Option<Self::Node>;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Detach the node from its parent.
    fn remove_node(&mut self, node: &Self::Node);

    /// All elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<Self::Node>, SelectorError>;

    /// Non-empty `id` attribute.
    fn id(&self, node: &Self::Node) -> Option<String> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    fn class_list(&self, node: &Self::Node) -> Vec<String> {
        self.attribute(node, "class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.class_list(node).iter().any(|c| c == class)
    }

    /// Root and body are never valid pick or highlight targets.
    fn is_root_or_body(&self, node: &Self::Node) -> bool {
        self.document_element().as_ref() == Some(node) || self.body().as_ref() == Some(node)
    }
}

// =============================================================================
// Mutation Observation
// =============================================================================

bitflags::bitflags! {
    /// What a mutation observer watches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveOptions: u8 {
        const CHILD_LIST = 1 << 0;
        const ATTRIBUTES = 1 << 1;
        const SUBTREE = 1 << 2;
        /// Keep the previous attribute value in each record
        const ATTRIBUTE_OLD_VALUE = 1 << 3;

        /// Subtree-wide child list and attribute changes with old values
        const STANDARD = Self::CHILD_LIST.bits()
            | Self::ATTRIBUTES.bits()
            | Self::SUBTREE.bits()
            | Self::ATTRIBUTE_OLD_VALUE.bits();
    }
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord<N> {
    /// Nodes were added to or removed from `target`
    ChildList { target: N, added: usize, removed: usize },
    /// An attribute of `target` changed
    Attributes {
        target: N,
        name: String,
        old_value: Option<String>,
    },
}

impl<N> MutationRecord<N> {
    pub fn target(&self) -> &N {
        match self {
            Self::ChildList { target, .. } | Self::Attributes { target, .. } => target,
        }
    }
}

/// A document whose body can be observed for mutations.
pub trait MutationSource {
    /// Start (or restart) observing the body.
    fn observe(&mut self, options: ObserveOptions);

    /// Stop observing. Pending records are discarded.
    fn disconnect(&mut self);

    /// Current options, `None` while disconnected.
    fn observed(&self) -> Option<ObserveOptions>;

    fn is_observing(&self) -> bool {
        self.observed().is_some()
    }
}
