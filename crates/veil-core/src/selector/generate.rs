//! Unique selector generation
//!
//! Strategies are tried from most to least robust; the first candidate that
//! matches exactly the target element (and nothing else) in the live document
//! wins. The structural path selector is the last resort.

use log::debug;

use super::{css_escape, SelectorError, TargetRejection};
use crate::config::EngineConfig;
use crate::dom::Dom;
use crate::markers::ToolMarkers;

/// Attribute values at or above this many characters are too volatile to key on.
const SHORT_VALUE_LEN: usize = 50;

/// `href` values get a longer allowance.
const HREF_VALUE_LEN: usize = 100;

/// Single class names too common to identify anything on their own.
const GENERIC_CLASSES: &[&str] = &["container", "wrapper", "target", "content", "item"];

/// ARIA state attributes worth combining with the tag name.
const ARIA_STATES: &[&str] = &["aria-current", "aria-selected", "aria-checked", "aria-expanded"];

/// Class prefixes tried as bare class selectors.
const MAX_BARE_CLASSES: usize = 3;

/// Class prefixes tried after a tag name.
const MAX_TAGGED_CLASSES: usize = 2;

#[derive(Debug, Clone)]
pub struct SelectorGenerator {
    max_length: usize,
    max_depth: usize,
    markers: ToolMarkers,
}

impl Default for SelectorGenerator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SelectorGenerator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_length: config.max_selector_length,
            max_depth: config.max_selector_depth,
            markers: ToolMarkers::from_config(config),
        }
    }

    /// Produce a selector that, right now, matches only `node`.
    pub fn generate<D: Dom>(&self, dom: &D, node: &D::Node) -> Result<String, SelectorError> {
        self.check_target(dom, node)?;

        if let Some((strategy, selector)) = self.find_unique(dom, node) {
            debug!("selector via {}: {}", strategy, selector);
            return Ok(selector);
        }

        let path = self.path_selector(dom, node);
        let len = path.chars().count();
        if len > self.max_length {
            return Err(SelectorError::TooLong {
                len,
                max: self.max_length,
            });
        }
        debug!("selector via path: {}", path);
        Ok(path)
    }

    /// Reject the root, the body and nodes from other documents.
    pub fn check_target<D: Dom>(&self, dom: &D, node: &D::Node) -> Result<(), SelectorError> {
        if dom.document_element().as_ref() == Some(node) {
            return Err(SelectorError::InvalidTarget(TargetRejection::DocumentRoot));
        }
        if dom.body().as_ref() == Some(node) {
            return Err(SelectorError::InvalidTarget(TargetRejection::Body));
        }
        if !dom.owns(node) {
            return Err(SelectorError::InvalidTarget(TargetRejection::ForeignDocument));
        }
        Ok(())
    }

    // ===== Strategy Chain =====

    fn find_unique<D: Dom>(&self, dom: &D, node: &D::Node) -> Option<(&'static str, String)> {
        let tag = dom.tag_name(node);
        let aria_label = dom.attribute(node, "aria-label").filter(|v| !v.is_empty());
        let short_aria = aria_label.as_deref().filter(|v| is_short(v, SHORT_VALUE_LEN));
        let role = dom.attribute(node, "role").filter(|v| !v.is_empty());

        // 1. id, or id narrowed by another attribute when ids collide
        if let Some(id) = dom.id(node) {
            let id_selector = format!("#{}", css_escape(&id));
            let matched = dom.query_selector_all(&id_selector).unwrap_or_default();
            if matched.len() == 1 && self.is_unique(dom, &id_selector, node) {
                return Some(("id", id_selector));
            }
            if matched.len() > 1 {
                if let Some(selector) = self.id_combination(dom, node, &tag, &id_selector, aria_label.as_deref()) {
                    return Some(("id combination", selector));
                }
            }
        }

        // 2. data-* attributes
        for (name, value) in dom.attributes(node) {
            if !name.starts_with("data-") || value.is_empty() || !is_short(&value, SHORT_VALUE_LEN) {
                continue;
            }
            let selector = attr_selector(&name, &value);
            if self.is_unique(dom, &selector, node) {
                return Some(("data attribute", selector));
            }
        }

        // 3. aria-label alone
        if let Some(label) = short_aria {
            let selector = attr_selector("aria-label", label);
            if self.is_unique(dom, &selector, node) {
                return Some(("aria-label", selector));
            }
        }

        // 4. tag[role]
        if let Some(role) = role.as_deref() {
            let selector = format!("{}{}", tag, attr_selector("role", role));
            if self.is_unique(dom, &selector, node) {
                return Some(("role", selector));
            }
        }

        // 5. classes
        if let Some(selector) = self.class_combination(dom, node, &tag, role.as_deref(), short_aria) {
            return Some(("classes", selector));
        }

        // 6. aria state attributes
        for name in ARIA_STATES {
            let Some(value) = dom.attribute(node, name).filter(|v| !v.is_empty()) else {
                continue;
            };
            let selector = format!("{}{}", tag, attr_selector(name, &value));
            if self.is_unique(dom, &selector, node) {
                return Some(("aria state", selector));
            }
        }

        None
    }

    /// `tag#id` plus `aria-label`, `href`, `title`, then `parent > tag#id[aria-label]`.
    fn id_combination<D: Dom>(
        &self,
        dom: &D,
        node: &D::Node,
        tag: &str,
        id_selector: &str,
        aria_label: Option<&str>,
    ) -> Option<String> {
        let base = format!("{}{}", tag, id_selector);
        let mut candidates = Vec::new();

        if let Some(label) = aria_label.filter(|v| is_short(v, SHORT_VALUE_LEN)) {
            candidates.push(format!("{}{}", base, attr_selector("aria-label", label)));
        }
        if let Some(href) = dom.attribute(node, "href").filter(|v| !v.is_empty() && is_short(v, HREF_VALUE_LEN)) {
            candidates.push(format!("{}{}", base, attr_selector("href", &href)));
        }
        if let Some(title) = dom.attribute(node, "title").filter(|v| !v.is_empty() && is_short(v, SHORT_VALUE_LEN)) {
            candidates.push(format!("{}{}", base, attr_selector("title", &title)));
        }
        if let (Some(parent), Some(label)) = (dom.parent(node), aria_label) {
            candidates.push(format!(
                "{} > {}{}",
                dom.tag_name(&parent),
                base,
                attr_selector("aria-label", label)
            ));
        }

        candidates.into_iter().find(|candidate| self.is_unique(dom, candidate, node))
    }

    fn class_combination<D: Dom>(
        &self,
        dom: &D,
        node: &D::Node,
        tag: &str,
        role: Option<&str>,
        aria_label: Option<&str>,
    ) -> Option<String> {
        let classes = self.markers.page_classes(dom, node);
        if classes.is_empty() || (classes.len() == 1 && GENERIC_CLASSES.contains(&classes[0].as_str())) {
            return None;
        }

        let class_chain = |count: usize| -> String {
            classes[..count].iter().fold(String::new(), |mut out, class| {
                out.push('.');
                out.push_str(&css_escape(class));
                out
            })
        };
        let bare = classes.len().min(MAX_BARE_CLASSES);
        let tagged = classes.len().min(MAX_TAGGED_CLASSES);

        let mut candidates: Vec<String> = (1..=bare).map(&class_chain).collect();
        candidates.extend((1..=tagged).map(|n| format!("{}{}", tag, class_chain(n))));
        if let Some(role) = role {
            let role = attr_selector("role", role);
            candidates.extend((1..=tagged).map(|n| format!("{}{}{}", tag, class_chain(n), role)));
        }
        if let Some(label) = aria_label {
            let label = attr_selector("aria-label", label);
            candidates.extend((1..=tagged).map(|n| format!("{}{}{}", tag, class_chain(n), label)));
        }

        candidates.into_iter().find(|candidate| self.is_unique(dom, candidate, node))
    }

    // ===== Path Fallback =====

    /// `tag#id:nth-of-type(k)` segments from the element upward, joined with
    /// ` > `. Climbing stops below the body, at the depth limit, or at an id
    /// level once the path so far is unique.
    pub fn path_selector<D: Dom>(&self, dom: &D, node: &D::Node) -> String {
        let body = dom.body();
        let mut segments: Vec<String> = Vec::new();
        let mut current = Some(node.clone());

        while let Some(element) = current {
            if body.as_ref() == Some(&element) || segments.len() >= self.max_depth {
                break;
            }

            let tag = dom.tag_name(&element);
            let mut segment = tag.clone();
            let id = dom.id(&element);
            if let Some(id) = &id {
                segment.push('#');
                segment.push_str(&css_escape(id));
            }

            let parent = dom.parent(&element);
            if let Some(parent) = &parent {
                let same_tag: Vec<D::Node> = dom
                    .children(parent)
                    .into_iter()
                    .filter(|sibling| dom.tag_name(sibling) == tag)
                    .collect();
                if same_tag.len() > 1 {
                    if let Some(index) = same_tag.iter().position(|sibling| *sibling == element) {
                        segment.push_str(&format!(":nth-of-type({})", index + 1));
                    }
                }
            }
            segments.push(segment);

            if id.is_some() {
                let candidate = join_path(&segments);
                if dom.query_selector_all(&candidate).map(|m| m.len()).unwrap_or(0) == 1 {
                    break;
                }
            }

            current = parent;
        }

        join_path(&segments)
    }

    /// Within the length limit and matching exactly `node`.
    fn is_unique<D: Dom>(&self, dom: &D, selector: &str, node: &D::Node) -> bool {
        if selector.chars().count() > self.max_length {
            return false;
        }
        match dom.query_selector_all(selector) {
            Ok(matched) => matched.len() == 1 && matched[0] == *node,
            Err(_) => false,
        }
    }
}

fn is_short(value: &str, limit: usize) -> bool {
    value.chars().count() < limit
}

fn attr_selector(name: &str, value: &str) -> String {
    format!("[{}=\"{}\"]", css_escape(name), css_escape(value))
}

/// Segments are collected bottom-up.
fn join_path(segments: &[String]) -> String {
    segments.iter().rev().map(String::as_str).collect::<Vec<_>>().join(" > ")
}
