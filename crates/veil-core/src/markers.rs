//! Classes and ids the tool injects into pages.

use crate::config::EngineConfig;
use crate::dom::Dom;

/// Maximum characters of text used in an element description.
const DESCRIPTION_TEXT_LEN: usize = 30;

/// Names of the marker classes and picker UI, derived from the UI prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMarkers {
    pub hidden_class: String,
    pub highlight_class: String,
    pub prefix: String,
}

impl Default for ToolMarkers {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ToolMarkers {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            hidden_class: config.hidden_class.clone(),
            highlight_class: config.highlight_class.clone(),
            prefix: config.ui_prefix.clone(),
        }
    }

    pub fn banner_id(&self) -> String {
        format!("{}picker-banner", self.prefix)
    }

    pub fn banner_class(&self) -> String {
        format!("{}picker-banner", self.prefix)
    }

    pub fn banner_text_class(&self) -> String {
        format!("{}picker-text", self.prefix)
    }

    pub fn escape_button_class(&self) -> String {
        format!("{}picker-esc", self.prefix)
    }

    pub fn tooltip_class(&self) -> String {
        format!("{}picker-tooltip", self.prefix)
    }

    /// The hide and highlight classes. These land on page elements and say
    /// nothing about the page's own structure.
    pub fn is_marker_class(&self, class: &str) -> bool {
        class == self.hidden_class || class == self.highlight_class
    }

    /// Any class the tool could have put there.
    pub fn is_tool_class(&self, class: &str) -> bool {
        class.starts_with(&self.prefix) || self.is_marker_class(class)
    }

    /// The element's classes minus everything the tool added.
    pub fn page_classes<D: Dom>(&self, dom: &D, node: &D::Node) -> Vec<String> {
        dom.class_list(node)
            .into_iter()
            .filter(|class| !self.is_tool_class(class))
            .collect()
    }

    /// Whether the element is part of the tool's own UI: a prefixed id, a
    /// prefixed class other than the markers, or anything inside the banner
    /// or tooltip.
    pub fn is_tool_element<D: Dom>(&self, dom: &D, node: &D::Node) -> bool {
        if dom.id(node).is_some_and(|id| id.starts_with(&self.prefix)) {
            return true;
        }
        if dom
            .class_list(node)
            .iter()
            .any(|class| class.starts_with(&self.prefix) && !self.is_marker_class(class))
        {
            return true;
        }

        let banner_id = self.banner_id();
        let banner_class = self.banner_class();
        let tooltip_class = self.tooltip_class();
        let mut current = dom.parent(node);
        while let Some(ancestor) = current {
            if dom.id(&ancestor).as_deref() == Some(banner_id.as_str())
                || dom.has_class(&ancestor, &banner_class)
                || dom.has_class(&ancestor, &tooltip_class)
            {
                return true;
            }
            current = dom.parent(&ancestor);
        }
        false
    }

    /// Short human label: `#id`, `.c1.c2`, leading text, or the tag name.
    pub fn describe<D: Dom>(&self, dom: &D, node: &D::Node) -> String {
        if let Some(id) = dom.id(node) {
            return format!("#{}", id);
        }

        let classes: Vec<String> = self.page_classes(dom, node).into_iter().take(2).collect();
        if !classes.is_empty() {
            return format!(".{}", classes.join("."));
        }

        let text = dom.text_content(node);
        let text = text.trim();
        if !text.is_empty() {
            return text.chars().take(DESCRIPTION_TEXT_LEN).collect();
        }

        dom.tag_name(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    #[test]
    fn test_ui_names() {
        let markers = ToolMarkers::default();
        assert_eq!(markers.banner_id(), "veil-picker-banner");
        assert_eq!(markers.tooltip_class(), "veil-picker-tooltip");
        assert_eq!(markers.escape_button_class(), "veil-picker-esc");
        assert!(markers.is_marker_class("veil-hidden"));
        assert!(markers.is_marker_class("veil-picker-highlight"));
        assert!(!markers.is_marker_class("veil-picker-banner"));
    }

    #[test]
    fn test_tool_element_detection() {
        let markers = ToolMarkers::default();
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let banner = dom.append_element(body, "div", &[("id", "veil-picker-banner"), ("class", "veil-picker-banner")]);
        let inner = dom.append_element(banner, "span", &[]);
        let tooltip = dom.append_element(body, "div", &[("class", "veil-picker-tooltip")]);
        let hidden = dom.append_element(body, "div", &[("class", "ad veil-hidden veil-picker-highlight")]);
        let plain = dom.append_element(body, "div", &[("class", "ad")]);

        assert!(markers.is_tool_element(&dom, &banner));
        assert!(markers.is_tool_element(&dom, &inner));
        assert!(markers.is_tool_element(&dom, &tooltip));
        assert!(!markers.is_tool_element(&dom, &hidden));
        assert!(!markers.is_tool_element(&dom, &plain));
    }

    #[test]
    fn test_describe() {
        let markers = ToolMarkers::default();
        let mut dom = MemoryDom::new();
        let body = dom.body_id();
        let with_id = dom.append_element(body, "div", &[("id", "hero"), ("class", "a")]);
        let with_classes = dom.append_element(body, "div", &[("class", "veil-picker-highlight card big wide")]);
        let with_text = dom.append_element(body, "p", &[]);
        dom.set_text_content(&with_text, "   This paragraph has a fairly long sentence in it  ");
        let bare = dom.append_element(body, "section", &[]);

        assert_eq!(markers.describe(&dom, &with_id), "#hero");
        assert_eq!(markers.describe(&dom, &with_classes), ".card.big");
        assert_eq!(markers.describe(&dom, &with_text), "This paragraph has a fairly lo");
        assert_eq!(markers.describe(&dom, &bare), "section");
    }
}
