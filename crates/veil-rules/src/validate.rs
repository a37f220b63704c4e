//! Validation and sanitization of records coming from the popup.
//!
//! Payloads arrive as loosely-typed JSON. Drafts are decoded leniently so the
//! user gets the specific validation message rather than a generic decode
//! error, then checked before anything is written.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use veil_core::PatternType;

use crate::error::ValidationError;

/// Block element names are cut to this many characters.
pub const MAX_NAME_LENGTH: usize = 50;

/// Longest preset name accepted.
pub const MAX_PRESET_NAME_LENGTH: usize = 30;

static JAVASCRIPT_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript:").unwrap());
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)on[a-z]+=").unwrap());
static DANGEROUS_SELECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:|expression\(|<script").unwrap());

// =============================================================================
// Drafts
// =============================================================================

/// A block element as submitted for saving. `id` is set when editing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockElementDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub selectors: Vec<String>,
    pub url_pattern: String,
    /// Kept as text so an unknown type gets its own message
    pub url_pattern_type: String,
}

impl BlockElementDraft {
    pub fn new(
        name: impl Into<String>,
        selectors: Vec<String>,
        url_pattern: impl Into<String>,
        url_pattern_type: PatternType,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            selectors,
            url_pattern: url_pattern.into(),
            url_pattern_type: url_pattern_type.as_str().to_string(),
        }
    }

    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        if let Some(selectors) = payload.get("selectors") {
            if !selectors.is_array() {
                return Err(ValidationError::SelectorsNotArray);
            }
        }
        serde_json::from_value(payload.clone()).map_err(|e| ValidationError::Payload(e.to_string()))
    }
}

/// A preset as submitted for saving.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresetDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub block_element_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl PresetDraft {
    pub fn new(name: impl Into<String>, block_element_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            block_element_ids,
            ..Self::default()
        }
    }

    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        if let Some(ids) = payload.get("blockElementIds") {
            if !ids.is_array() {
                return Err(ValidationError::BlockElementIdsNotArray);
            }
        }
        serde_json::from_value(payload.clone()).map_err(|e| ValidationError::Payload(e.to_string()))
    }
}

// =============================================================================
// Checks
// =============================================================================

/// Check a block element draft, returning its parsed pattern type.
pub fn validate_block_element(draft: &BlockElementDraft) -> Result<PatternType, ValidationError> {
    if draft.name.trim().is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if draft.selectors.is_empty() {
        return Err(ValidationError::NoSelectors);
    }
    if draft.url_pattern.is_empty() {
        return Err(ValidationError::UrlPatternRequired);
    }
    if draft.url_pattern_type.is_empty() {
        return Err(ValidationError::UrlPatternTypeRequired);
    }
    let pattern_type =
        PatternType::parse(&draft.url_pattern_type).ok_or(ValidationError::InvalidUrlPatternType)?;

    for selector in &draft.selectors {
        safe_selector(selector)?;
    }
    Ok(pattern_type)
}

/// Check a preset draft against the ids of the stored block elements.
pub fn validate_preset<'a, I>(draft: &PresetDraft, known_ids: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    if draft.name.trim().is_empty() {
        return Err(ValidationError::PresetNameEmpty);
    }
    if draft.name.chars().count() > MAX_PRESET_NAME_LENGTH {
        return Err(ValidationError::PresetNameTooLong {
            max: MAX_PRESET_NAME_LENGTH,
        });
    }
    if draft.block_element_ids.is_empty() {
        return Err(ValidationError::EmptyPreset);
    }

    let known: std::collections::HashSet<&str> = known_ids.into_iter().collect();
    let missing: Vec<String> = draft
        .block_element_ids
        .iter()
        .filter(|id| !known.contains(id.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::UnknownBlockElements { missing });
    }
    Ok(())
}

/// Reject selectors that smuggle script.
pub fn safe_selector(selector: &str) -> Result<&str, ValidationError> {
    if DANGEROUS_SELECTOR.is_match(selector) {
        return Err(ValidationError::UnsafeSelector);
    }
    Ok(selector)
}

/// Trim, cut to [`MAX_NAME_LENGTH`] characters, strip script fragments and
/// HTML-escape.
pub fn sanitize_name(name: &str) -> String {
    let cut: String = name.trim().chars().take(MAX_NAME_LENGTH).collect();
    let cleaned = JAVASCRIPT_SCHEME.replace_all(&cut, "");
    let cleaned = EVENT_HANDLER.replace_all(&cleaned, "");
    escape_html(&cleaned)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
