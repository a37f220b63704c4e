//! Selector matching over a [`MemoryDom`].
//!
//! Parsing and matching come from the `selectors` crate with `scraper`'s
//! selector implementation; this module only exposes arena nodes to it as
//! [`selectors::Element`]s. Pseudo-elements and dynamic pseudo-classes such as
//! `:hover` have no meaning outside a live page and are rejected as
//! [`SelectorError::Syntax`].

use cssparser::ParserInput;
use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    self, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode, NeedsSelectorFlags,
    QuirksMode,
};
use selectors::parser::{ParseRelative, Selector, SelectorImpl, SelectorParseErrorKind};
use selectors::{Element, NthIndexCache, OpaqueElement};

use super::SelectorError;
use crate::dom::memory::NodeData;
use crate::dom::{MemoryDom, NodeId};

type Namespace = <Simple as SelectorImpl>::NamespaceUrl;

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<Selector<Simple>>,
}

struct Parser;

impl<'i> selectors::parser::Parser<'i> for Parser {
    type Impl = Simple;
    type Error = SelectorParseErrorKind<'i>;
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let mut input = ParserInput::new(selector);
        let mut parser = cssparser::Parser::new(&mut input);
        selectors::parser::SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
            .map(|list| Self {
                selectors: list.0.into_iter().collect(),
            })
            .map_err(|e| SelectorError::Syntax {
                selector: selector.to_string(),
                reason: SelectorErrorKind::from(e).to_string(),
            })
    }

    /// Whether `node` matches any selector in the list.
    pub fn matches(&self, dom: &MemoryDom, node: NodeId) -> bool {
        let Some(element) = MemoryElement::new(dom, node) else {
            return false;
        };
        let mut cache = NthIndexCache::default();
        let mut context = new_context(&mut cache);
        self.matches_element(&element, &mut context)
    }

    /// Every matching element in document order.
    pub fn query_all(&self, dom: &MemoryDom) -> Vec<NodeId> {
        let mut cache = NthIndexCache::default();
        let mut context = new_context(&mut cache);
        let mut found = Vec::new();
        let mut stack = vec![dom.root()];
        while let Some(node) = stack.pop() {
            let Some(element) = MemoryElement::new(dom, node) else {
                continue;
            };
            if self.matches_element(&element, &mut context) {
                found.push(node);
            }
            stack.extend(element.data.children.iter().rev().copied());
        }
        found
    }

    fn matches_element(&self, element: &MemoryElement<'_>, context: &mut MatchingContext<'_, Simple>) -> bool {
        self.selectors
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, element, context))
    }
}

fn new_context(cache: &mut NthIndexCache) -> MatchingContext<'_, Simple> {
    MatchingContext::new(
        MatchingMode::Normal,
        None,
        cache,
        QuirksMode::NoQuirks,
        NeedsSelectorFlags::No,
        IgnoreNthChildForInvalidation::No,
    )
}

// =============================================================================
// Element Adapter
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct MemoryElement<'a> {
    dom: &'a MemoryDom,
    id: NodeId,
    data: &'a NodeData,
}

impl<'a> MemoryElement<'a> {
    fn new(dom: &'a MemoryDom, id: NodeId) -> Option<Self> {
        dom.data(id).map(|data| Self { dom, id, data })
    }

    fn sibling(&self, step: isize) -> Option<Self> {
        let parent = self.dom.data(self.data.parent?)?;
        let at = parent.children.iter().position(|c| *c == self.id)?;
        let next = at.checked_add_signed(step)?;
        Self::new(self.dom, *parent.children.get(next)?)
    }

    fn attr(&self, name: &str) -> Option<&'a str> {
        self.data
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl Element for MemoryElement<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.data)
    }

    fn parent_element(&self) -> Option<Self> {
        Self::new(self.dom, self.data.parent?)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling(-1)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling(1)
    }

    fn first_element_child(&self) -> Option<Self> {
        Self::new(self.dom, *self.data.children.first()?)
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.data.tag == *name.0
    }

    fn has_namespace(&self, ns: &Namespace) -> bool {
        ns.is_empty()
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag == other.data.tag
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if matches!(*ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
            return false;
        }
        self.attr(&local_name.0).is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(&self, _pc: &NonTSPseudoClass, _context: &mut MatchingContext<Simple>) -> bool {
        false
    }

    fn match_pseudo_element(&self, _pe: &PseudoElement, _context: &mut MatchingContext<Simple>) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.data.tag.as_str(), "a" | "area") && self.attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        self.data.tag == "slot"
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("class").is_some_and(|value| {
            value
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.data.children.is_empty() && self.data.text.is_empty()
    }

    fn is_root(&self) -> bool {
        self.id == self.dom.root()
    }
}
