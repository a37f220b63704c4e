//! Interactive element picker
//!
//! `Idle -> Active` on start: a banner is appended to the body and the host
//! installs capturing listeners for pointer-over, click and key-down. While
//! active, hovering highlights one element at a time and moves a tooltip;
//! clicking picks the element, Escape cancels. Every path back to `Idle`
//! tears down the banner, tooltip, highlight and listeners.

use url::Url;

use crate::config::EngineConfig;
use crate::dom::Dom;
use crate::markers::ToolMarkers;
use crate::pattern::PatternError;
use crate::selector::{SelectorError, SelectorGenerator, TargetRejection};
use crate::types::PickedElement;

/// Tooltip offset from the pointer, in CSS pixels.
const TOOLTIP_OFFSET: f64 = 15.0;

const BANNER_TEXT: &str = "Click an element to block it";
const ESCAPE_LABEL: &str = "ESC";

/// Installs and removes the picker's document listeners.
pub trait PickerHost {
    fn attach_listeners(&mut self);
    fn detach_listeners(&mut self);
}

/// The page the picker runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub href: String,
    pub hostname: String,
    pub pathname: String,
}

impl PageLocation {
    pub fn new(href: impl Into<String>, hostname: impl Into<String>, pathname: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            hostname: hostname.into(),
            pathname: pathname.into(),
        }
    }

    pub fn parse(href: &str) -> Result<Self, PatternError> {
        let url = Url::parse(href).map_err(|e| PatternError::InvalidUrl {
            url: href.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(href, url.host_str().unwrap_or_default(), url.path()))
    }

    /// Hostname plus pathname, the default `path_pattern` for a pick.
    pub fn path_pattern(&self) -> String {
        format!("{}{}", self.hostname, self.pathname)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickerState<N> {
    Idle,
    Active {
        highlighted: Option<N>,
        banner: Option<N>,
        tooltip: Option<N>,
    },
}

/// Why a click did not produce a pick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("The picker's own controls cannot be selected.")]
    ToolUi,
    #[error("Elements inside frames cannot be selected.")]
    ForeignDocument,
    /// The `<html>` or `<body>` element
    #[error("The page body cannot be selected.")]
    DocumentRoot,
    #[error("This element cannot be selected.")]
    Unselectable(SelectorError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The picker was idle
    Ignored,
    /// The banner's escape button was clicked
    Cancelled,
    /// Nothing changed; the picker stays active
    Rejected(Rejection),
    /// The picker is idle again
    Picked(PickedElement),
}

pub struct Picker<H: PickerHost, N> {
    host: H,
    state: PickerState<N>,
    generator: SelectorGenerator,
    markers: ToolMarkers,
}

impl<H: PickerHost, N: Clone + PartialEq> Picker<H, N> {
    pub fn new(host: H, config: &EngineConfig) -> Self {
        Self {
            host,
            state: PickerState::Idle,
            generator: SelectorGenerator::from_config(config),
            markers: ToolMarkers::from_config(config),
        }
    }

    pub fn state(&self) -> &PickerState<N> {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PickerState::Active { .. })
    }

    pub fn highlighted(&self) -> Option<&N> {
        match &self.state {
            PickerState::Active { highlighted, .. } => highlighted.as_ref(),
            PickerState::Idle => None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn markers(&self) -> &ToolMarkers {
        &self.markers
    }

    /// Enter `Active`. Returns `false` if already active.
    pub fn start<D: Dom<Node = N>>(&mut self, dom: &mut D) -> bool {
        if self.is_active() {
            return false;
        }
        let banner = self.create_banner(dom);
        self.host.attach_listeners();
        self.state = PickerState::Active {
            highlighted: None,
            banner,
            tooltip: None,
        };
        true
    }

    /// Return to `Idle`, removing everything the picker added. A no-op when
    /// already idle.
    pub fn stop<D: Dom<Node = N>>(&mut self, dom: &mut D) -> bool {
        let PickerState::Active {
            highlighted,
            banner,
            tooltip,
        } = std::mem::replace(&mut self.state, PickerState::Idle)
        else {
            return false;
        };

        if let Some(banner) = banner {
            dom.remove_node(&banner);
        }
        if let Some(tooltip) = tooltip {
            dom.remove_node(&tooltip);
        }
        if let Some(node) = highlighted {
            dom.remove_class(&node, &self.markers.highlight_class);
        }
        self.host.detach_listeners();
        true
    }

    /// Highlight `target` and move the tooltip next to the pointer. Returns
    /// whether the event was handled.
    pub fn hover<D: Dom<Node = N>>(&mut self, dom: &mut D, target: Option<&N>, x: f64, y: f64) -> bool {
        let PickerState::Active {
            highlighted, tooltip, ..
        } = &mut self.state
        else {
            return false;
        };
        let Some(target) = target else {
            return false;
        };
        if self.markers.is_tool_element(dom, target) || dom.is_root_or_body(target) {
            return false;
        }

        if let Some(previous) = highlighted.take() {
            dom.remove_class(&previous, &self.markers.highlight_class);
        }
        dom.add_class(target, &self.markers.highlight_class);
        *highlighted = Some(target.clone());

        if tooltip.is_none() {
            *tooltip = dom.create_element("div");
            if let (Some(node), Some(body)) = (tooltip.as_ref(), dom.body()) {
                dom.set_attribute(node, "class", &self.markers.tooltip_class());
                dom.append_child(&body, node);
            }
        }
        if let Some(node) = tooltip.as_ref() {
            let description = self.markers.describe(dom, target);
            dom.set_text_content(node, &description);
            dom.set_style(node, "left", &format!("{}px", x + TOOLTIP_OFFSET));
            dom.set_style(node, "top", &format!("{}px", y + TOOLTIP_OFFSET));
        }
        true
    }

    /// Handle a click. The caller suppresses the page's default handling
    /// whenever the picker is active.
    pub fn click<D: Dom<Node = N>>(&mut self, dom: &mut D, target: Option<&N>, location: &PageLocation) -> ClickOutcome {
        if !self.is_active() {
            return ClickOutcome::Ignored;
        }
        let Some(target) = target else {
            return ClickOutcome::Rejected(Rejection::Unselectable(SelectorError::InvalidTarget(
                TargetRejection::Missing,
            )));
        };

        if self.is_escape_button(dom, target) {
            self.stop(dom);
            return ClickOutcome::Cancelled;
        }
        if self.markers.is_tool_element(dom, target) {
            return ClickOutcome::Rejected(Rejection::ToolUi);
        }
        if !dom.owns(target) {
            return ClickOutcome::Rejected(Rejection::ForeignDocument);
        }
        if dom.is_root_or_body(target) {
            return ClickOutcome::Rejected(Rejection::DocumentRoot);
        }

        let selector = match self.generator.generate(dom, target) {
            Ok(selector) => selector,
            Err(e) => return ClickOutcome::Rejected(Rejection::Unselectable(e)),
        };

        let picked = PickedElement {
            selectors: vec![selector],
            description: self.markers.describe(dom, target),
            tag_name: dom.tag_name(target),
            url: location.href.clone(),
            domain: location.hostname.clone(),
            path_pattern: location.path_pattern(),
            rect: dom.bounding_box(target),
        };
        self.stop(dom);
        ClickOutcome::Picked(picked)
    }

    /// Escape cancels. Returns whether the key was consumed.
    pub fn key_down<D: Dom<Node = N>>(&mut self, dom: &mut D, key: &str) -> bool {
        if key == "Escape" && self.is_active() {
            self.stop(dom)
        } else {
            false
        }
    }

    fn create_banner<D: Dom<Node = N>>(&self, dom: &mut D) -> Option<N> {
        let body = dom.body()?;
        let banner = dom.create_element("div")?;
        dom.set_attribute(&banner, "id", &self.markers.banner_id());
        dom.set_attribute(&banner, "class", &self.markers.banner_class());

        if let Some(text) = dom.create_element("div") {
            dom.set_attribute(&text, "class", &self.markers.banner_text_class());
            if let Some(span) = dom.create_element("span") {
                dom.set_text_content(&span, BANNER_TEXT);
                dom.append_child(&text, &span);
            }
            dom.append_child(&banner, &text);
        }
        if let Some(escape) = dom.create_element("div") {
            dom.set_attribute(&escape, "class", &self.markers.escape_button_class());
            dom.set_text_content(&escape, ESCAPE_LABEL);
            dom.append_child(&banner, &escape);
        }

        dom.append_child(&body, &banner);
        Some(banner)
    }

    fn is_escape_button<D: Dom<Node = N>>(&self, dom: &D, target: &N) -> bool {
        let class = self.markers.escape_button_class();
        let mut current = Some(target.clone());
        while let Some(node) = current {
            if dom.has_class(&node, &class) {
                return true;
            }
            current = dom.parent(&node);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDom, NodeId};
    use crate::types::ElementRect;

    #[derive(Debug, Default)]
    struct CountingHost {
        attached: usize,
        detached: usize,
    }

    impl PickerHost for CountingHost {
        fn attach_listeners(&mut self) {
            self.attached += 1;
        }

        fn detach_listeners(&mut self) {
            self.detached += 1;
        }
    }

    fn picker() -> Picker<CountingHost, NodeId> {
        Picker::new(CountingHost::default(), &EngineConfig::default())
    }

    fn location() -> PageLocation {
        PageLocation::parse("https://www.example.com/videos/watch?v=1").unwrap()
    }

    fn banner(dom: &MemoryDom) -> Option<NodeId> {
        dom.query_selector_all("#veil-picker-banner").unwrap().first().copied()
    }

    #[test]
    fn test_page_location() {
        let loc = location();
        assert_eq!(loc.hostname, "www.example.com");
        assert_eq!(loc.pathname, "/videos/watch");
        assert_eq!(loc.path_pattern(), "www.example.com/videos/watch");
        assert!(PageLocation::parse("nope").is_err());
    }

    #[test]
    fn test_start_and_stop() {
        let mut dom = MemoryDom::new();
        let mut picker = picker();

        assert!(picker.start(&mut dom));
        assert!(!picker.start(&mut dom));
        assert!(picker.is_active());
        assert_eq!(picker.host().attached, 1);
        let banner_node = banner(&dom).unwrap();
        assert_eq!(dom.query_selector_all(".veil-picker-esc").unwrap().len(), 1);
        assert!(dom.text_content(&banner_node).contains("ESC"));

        assert!(picker.stop(&mut dom));
        assert!(!picker.stop(&mut dom));
        assert_eq!(picker.host().detached, 1);
        assert!(banner(&dom).is_none());
        assert_eq!(picker.state(), &PickerState::Idle);
    }

    #[test]
    fn test_hover_moves_single_highlight() {
        let mut dom = MemoryDom::new();
        let a = dom.append_element(dom.body_id(), "div", &[("id", "a")]);
        let b = dom.append_element(dom.body_id(), "div", &[("class", "card")]);
        let mut picker = picker();
        picker.start(&mut dom);

        assert!(picker.hover(&mut dom, Some(&a), 10.0, 20.0));
        assert!(dom.has_class(&a, "veil-picker-highlight"));
        assert!(picker.hover(&mut dom, Some(&b), 30.0, 40.0));
        assert!(!dom.has_class(&a, "veil-picker-highlight"));
        assert!(dom.has_class(&b, "veil-picker-highlight"));
        assert_eq!(picker.highlighted(), Some(&b));

        let tooltips = dom.query_selector_all(".veil-picker-tooltip").unwrap();
        assert_eq!(tooltips.len(), 1);
        assert_eq!(dom.text_content(&tooltips[0]), ".card");
        assert_eq!(dom.style(tooltips[0], "left"), Some("45px"));
        assert_eq!(dom.style(tooltips[0], "top"), Some("55px"));
    }

    #[test]
    fn test_hover_ignores_tool_ui_and_body() {
        let mut dom = MemoryDom::new();
        let mut picker = picker();
        picker.start(&mut dom);
        let banner_node = banner(&dom).unwrap();

        let (body, root) = (dom.body_id(), dom.root());

        assert!(!picker.hover(&mut dom, Some(&banner_node), 0.0, 0.0));
        assert!(!picker.hover(&mut dom, Some(&body), 0.0, 0.0));
        assert!(!picker.hover(&mut dom, Some(&root), 0.0, 0.0));
        assert!(picker.highlighted().is_none());
    }

    #[test]
    fn test_hover_while_idle_does_nothing() {
        let mut dom = MemoryDom::new();
        let a = dom.append_element(dom.body_id(), "div", &[]);
        let mut picker = picker();
        assert!(!picker.hover(&mut dom, Some(&a), 0.0, 0.0));
        assert!(!dom.has_class(&a, "veil-picker-highlight"));
    }

    #[test]
    fn test_click_picks_and_tears_down() {
        let mut dom = MemoryDom::new();
        let ad = dom.append_element(dom.body_id(), "aside", &[("class", "sponsored")]);
        dom.set_rect(ad, ElementRect { x: 1.0, y: 2.0, width: 300.0, height: 250.0 });
        let mut picker = picker();
        picker.start(&mut dom);
        picker.hover(&mut dom, Some(&ad), 5.0, 5.0);

        let ClickOutcome::Picked(picked) = picker.click(&mut dom, Some(&ad), &location()) else {
            panic!("expected a pick");
        };
        assert_eq!(picked.selectors, vec![".sponsored".to_string()]);
        assert_eq!(picked.description, ".sponsored");
        assert_eq!(picked.tag_name, "aside");
        assert_eq!(picked.domain, "www.example.com");
        assert_eq!(picked.path_pattern, "www.example.com/videos/watch");
        assert_eq!(picked.rect.width, 300.0);

        assert!(!picker.is_active());
        assert_eq!(picker.host().detached, 1);
        assert!(!dom.has_class(&ad, "veil-picker-highlight"));
        assert!(dom.query_selector_all(".veil-picker-tooltip").unwrap().is_empty());
        assert!(banner(&dom).is_none());
    }

    #[test]
    fn test_click_rejections_keep_picker_active() {
        let mut dom = MemoryDom::new();
        let foreign = dom.create_foreign_element("div");
        let mut picker = picker();
        picker.start(&mut dom);
        let tooltip_host = dom.append_element(dom.body_id(), "div", &[("class", "veil-picker-tooltip")]);

        let loc = location();
        assert_eq!(
            picker.click(&mut dom, Some(&tooltip_host), &loc),
            ClickOutcome::Rejected(Rejection::ToolUi)
        );
        assert_eq!(
            picker.click(&mut dom, Some(&foreign), &loc),
            ClickOutcome::Rejected(Rejection::ForeignDocument)
        );
        let body = dom.body_id();
        assert_eq!(
            picker.click(&mut dom, Some(&body), &loc),
            ClickOutcome::Rejected(Rejection::DocumentRoot)
        );
        assert!(picker.is_active());
    }

    #[test]
    fn test_unselectable_element_keeps_picker_active() {
        let config = EngineConfig {
            max_selector_length: 4,
            ..EngineConfig::default()
        };
        let mut dom = MemoryDom::new();
        let outer = dom.append_element(dom.body_id(), "div", &[]);
        let inner = dom.append_element(outer, "span", &[]);
        let mut picker: Picker<CountingHost, NodeId> = Picker::new(CountingHost::default(), &config);
        picker.start(&mut dom);

        let outcome = picker.click(&mut dom, Some(&inner), &location());
        assert!(matches!(
            outcome,
            ClickOutcome::Rejected(Rejection::Unselectable(SelectorError::TooLong { .. }))
        ));
        assert!(picker.is_active());
    }

    #[test]
    fn test_escape_button_and_key() {
        let mut dom = MemoryDom::new();
        let mut picker = picker();
        picker.start(&mut dom);
        let escape = dom.query_selector_all(".veil-picker-esc").unwrap()[0];
        assert_eq!(picker.click(&mut dom, Some(&escape), &location()), ClickOutcome::Cancelled);
        assert!(!picker.is_active());

        picker.start(&mut dom);
        assert!(!picker.key_down(&mut dom, "Enter"));
        assert!(picker.key_down(&mut dom, "Escape"));
        assert!(!picker.key_down(&mut dom, "Escape"));
        assert_eq!(picker.host().attached, 2);
        assert_eq!(picker.host().detached, 2);
    }

    #[test]
    fn test_click_while_idle_is_ignored() {
        let mut dom = MemoryDom::new();
        let a = dom.append_element(dom.body_id(), "div", &[]);
        assert_eq!(picker().click(&mut dom, Some(&a), &location()), ClickOutcome::Ignored);
    }
}
