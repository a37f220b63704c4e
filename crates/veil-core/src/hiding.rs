//! Hiding engine
//!
//! Hides elements by adding a marker class; the page stylesheet injected next
//! to the content script turns that class into `display: none`. Each block
//! element carries an ordered selector list and only the first selector that
//! matches anything is used.

use log::{debug, warn};

use crate::config::EngineConfig;
use crate::dom::Dom;
use crate::selector::css_escape;
use crate::types::BlockElement;

/// Outcome of one [`HidingEngine::apply`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Block elements processed
    pub rules: usize,
    /// Block elements whose selectors matched nothing
    pub unmatched: usize,
    /// Elements newly marked hidden
    pub hidden: usize,
}

#[derive(Debug, Clone)]
pub struct HidingEngine {
    hidden_class: String,
}

impl Default for HidingEngine {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl HidingEngine {
    pub fn new(hidden_class: impl Into<String>) -> Self {
        Self {
            hidden_class: hidden_class.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.hidden_class.clone())
    }

    pub fn hidden_class(&self) -> &str {
        &self.hidden_class
    }

    /// Mark every match of the first selector that matches anything.
    /// Returns how many elements were newly marked, or `None` if no selector
    /// matched.
    pub fn hide_by_selectors<D: Dom>(&self, dom: &mut D, selectors: &[String]) -> Option<usize> {
        for selector in selectors {
            let matched = match dom.query_selector_all(selector) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!("skipping selector: {}", e);
                    continue;
                }
            };
            if matched.is_empty() {
                continue;
            }

            let mut newly_hidden = 0;
            for node in &matched {
                if !dom.has_class(node, &self.hidden_class) {
                    dom.add_class(node, &self.hidden_class);
                    newly_hidden += 1;
                }
            }
            return Some(newly_hidden);
        }
        None
    }

    pub fn apply<D: Dom>(&self, dom: &mut D, elements: &[BlockElement]) -> ApplyReport {
        let mut report = ApplyReport {
            rules: elements.len(),
            ..ApplyReport::default()
        };
        for element in elements {
            match self.hide_by_selectors(dom, &element.selectors) {
                Some(count) => report.hidden += count,
                None => report.unmatched += 1,
            }
        }
        debug!(
            "applied {} rules: {} elements hidden, {} rules unmatched",
            report.rules, report.hidden, report.unmatched
        );
        report
    }

    /// Remove the marker from every element that carries it.
    pub fn unhide_all<D: Dom>(&self, dom: &mut D) -> usize {
        let hidden = self.hidden_elements(dom);
        for node in &hidden {
            dom.remove_class(node, &self.hidden_class);
        }
        hidden.len()
    }

    /// Unhide everything, then apply `elements`.
    pub fn reapply<D: Dom>(&self, dom: &mut D, elements: &[BlockElement]) -> ApplyReport {
        self.unhide_all(dom);
        self.apply(dom, elements)
    }

    pub fn hidden_elements<D: Dom>(&self, dom: &D) -> Vec<D::Node> {
        let selector = format!(".{}", css_escape(&self.hidden_class));
        dom.query_selector_all(&selector).unwrap_or_default()
    }
}
