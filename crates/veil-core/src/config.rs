//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Default debounce quiet period for DOM mutations (ms).
pub const DEBOUNCE_DELAY_MS: u64 = 300;

/// Longest selector the generator will emit.
pub const MAX_SELECTOR_LENGTH: usize = 500;

/// Maximum number of levels in a path selector.
pub const MAX_SELECTOR_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_hidden_class")]
    pub hidden_class: String,
    #[serde(default = "default_highlight_class")]
    pub highlight_class: String,
    /// Prefix of every id and class the tool injects into a page
    #[serde(default = "default_ui_prefix")]
    pub ui_prefix: String,
    #[serde(default = "default_max_selector_length")]
    pub max_selector_length: usize,
    #[serde(default = "default_max_selector_depth")]
    pub max_selector_depth: usize,
}

fn default_debounce_ms() -> u64 {
    DEBOUNCE_DELAY_MS
}

fn default_hidden_class() -> String {
    "veil-hidden".to_string()
}

fn default_highlight_class() -> String {
    "veil-picker-highlight".to_string()
}

fn default_ui_prefix() -> String {
    "veil-".to_string()
}

fn default_max_selector_length() -> usize {
    MAX_SELECTOR_LENGTH
}

fn default_max_selector_depth() -> usize {
    MAX_SELECTOR_DEPTH
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            hidden_class: default_hidden_class(),
            highlight_class: default_highlight_class(),
            ui_prefix: default_ui_prefix(),
            max_selector_length: default_max_selector_length(),
            max_selector_depth: default_max_selector_depth(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"debounce_ms": 50}"#).unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.hidden_class, "veil-hidden");
        assert_eq!(config.max_selector_length, 500);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }
}
