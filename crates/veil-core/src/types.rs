//! Core type definitions for Veil
//!
//! These records are persisted by the rule store and exchanged with the popup,
//! so their serialized field names are camelCase and must stay stable.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// URL Pattern Types
// =============================================================================

/// How a block element's `url_pattern` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Whole site, subdomains included (e.g. `youtube.com`)
    SiteWide,
    /// Host plus a path prefix with `*` wildcards (e.g. `youtube.com/watch*`)
    PathPattern,
    /// Byte-exact URL
    ExactPage,
}

impl PatternType {
    /// Parse from the stored string form. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "site_wide" => Some(Self::SiteWide),
            "path_pattern" => Some(Self::PathPattern),
            "exact_page" => Some(Self::ExactPage),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteWide => "site_wide",
            Self::PathPattern => "path_pattern",
            Self::ExactPage => "exact_page",
        }
    }
}

// =============================================================================
// Block Element
// =============================================================================

/// A named, reusable hide target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BlockElement {
    /// Opaque id, immutable once created
    pub id: String,
    /// Sanitized user label
    pub name: String,
    /// Fallback chain: the first selector matching anything wins
    pub selectors: Vec<String>,
    pub url_pattern: String,
    pub url_pattern_type: PatternType,
    pub created_at: String,
    pub updated_at: String,
}

// =============================================================================
// Preset
// =============================================================================

/// A named, togglable group of block elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    /// Non-owning references; display order is preserved
    pub block_element_ids: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub icon: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Preset {
    pub fn contains(&self, block_element_id: &str) -> bool {
        self.block_element_ids.iter().any(|id| id == block_element_id)
    }
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

/// Global display flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub show_placeholder: bool,
    pub animate_hide: bool,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_placeholder: false,
            animate_hide: true,
            theme: Theme::Auto,
        }
    }
}

// =============================================================================
// Picked Element
// =============================================================================

/// Size and position of a picked element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Payload of the "element picked" event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PickedElement {
    pub selectors: Vec<String>,
    pub description: String,
    pub tag_name: String,
    /// Full page URL
    pub url: String,
    /// Page hostname
    pub domain: String,
    /// Hostname plus pathname, ready to be used as a `path_pattern`
    pub path_pattern: String,
    pub rect: ElementRect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_type_round_trip_names() {
        for ty in [PatternType::SiteWide, PatternType::PathPattern, PatternType::ExactPage] {
            assert_eq!(PatternType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(PatternType::parse("regex"), None);
    }

    #[test]
    fn test_block_element_uses_camel_case() {
        let element = BlockElement {
            id: "be_1".to_string(),
            name: "Shorts".to_string(),
            selectors: vec!["#shorts".to_string()],
            url_pattern: "youtube.com".to_string(),
            url_pattern_type: PatternType::SiteWide,
            created_at: "2025-01-01T00:00:00.000Z".to_string(),
            updated_at: "2025-01-01T00:00:00.000Z".to_string(),
        };
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["urlPattern"], "youtube.com");
        assert_eq!(json["urlPatternType"], "site_wide");
        assert!(json.get("url_pattern").is_none());
    }

    #[test]
    fn test_preset_enabled_defaults_to_false() {
        let preset: Preset = serde_json::from_str(
            r#"{"id":"p","name":"Focus","blockElementIds":["a"],"createdAt":"t","updatedAt":"t"}"#,
        )
        .unwrap();
        assert!(!preset.enabled);
        assert!(preset.contains("a"));
    }

    #[test]
    fn test_settings_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.animate_hide);
    }
}
