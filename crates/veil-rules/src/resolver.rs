//! Active-rule resolution
//!
//! A block element is active on a page when some enabled preset references it
//! and its URL pattern matches the page.

use std::collections::HashSet;

use log::{debug, warn};
use veil_core::{pattern, BlockElement, Preset};

/// Block elements to apply on `current_url`, deduplicated by id, in the order
/// of `elements`. Never fails: an unusable URL means no active rules.
pub fn resolve(elements: &[BlockElement], presets: &[Preset], current_url: &str) -> Vec<BlockElement> {
    let enabled_ids: HashSet<&str> = presets
        .iter()
        .filter(|p| p.enabled)
        .flat_map(|p| p.block_element_ids.iter().map(String::as_str))
        .collect();
    if enabled_ids.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut active = Vec::new();
    for element in elements {
        if !enabled_ids.contains(element.id.as_str()) || !seen.insert(element.id.as_str()) {
            continue;
        }
        match pattern::matches(current_url, &element.url_pattern, element.url_pattern_type) {
            Ok(true) => active.push(element.clone()),
            Ok(false) => {}
            Err(e) => {
                warn!("no active rules: {}", e);
                return Vec::new();
            }
        }
    }

    debug!("{} active block elements for {}", active.len(), current_url);
    active
}
