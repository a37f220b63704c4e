//! Error types for the rule store and coordinator.

use thiserror::Error;

/// Failures of the underlying key-value store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The persistence layer cannot be reached (e.g. the host context was torn down)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Bad user input. The messages are shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Element name is required")]
    NameRequired,

    #[error("Selectors must be an array")]
    SelectorsNotArray,

    #[error("At least one selector is required")]
    NoSelectors,

    #[error("Invalid selector pattern")]
    UnsafeSelector,

    #[error("URL pattern is required")]
    UrlPatternRequired,

    #[error("URL pattern type is required")]
    UrlPatternTypeRequired,

    #[error("Invalid URL pattern type")]
    InvalidUrlPatternType,

    #[error("Preset name cannot be empty")]
    PresetNameEmpty,

    #[error("Preset name must be {max} characters or less")]
    PresetNameTooLong { max: usize },

    #[error("blockElementIds must be an array")]
    BlockElementIdsNotArray,

    #[error("Preset must contain at least one Block Element")]
    EmptyPreset,

    #[error("Some Block Elements do not exist")]
    UnknownBlockElements { missing: Vec<String> },

    #[error("Invalid message payload: {0}")]
    Payload(String),
}

/// Which collection a missing record was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    BlockElement,
    Preset,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::BlockElement => write!(f, "Block Element"),
            RecordKind::Preset => write!(f, "Preset"),
        }
    }
}

/// Error type for rule store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{kind} not found")]
    NotFound { kind: RecordKind, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Presets referencing a deleted block element could not be rewritten;
    /// the deletion was not committed
    #[error("Failed to update presets referencing {id}: {source}")]
    Cascade {
        id: String,
        #[source]
        source: StoreError,
    },
}

impl RuleError {
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        RuleError::NotFound { kind, id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_popup_text() {
        assert_eq!(ValidationError::NoSelectors.to_string(), "At least one selector is required");
        assert_eq!(
            ValidationError::PresetNameTooLong { max: 30 }.to_string(),
            "Preset name must be 30 characters or less"
        );
        assert_eq!(RuleError::not_found(RecordKind::Preset, "p1").to_string(), "Preset not found");
    }

    #[test]
    fn test_validation_is_transparent() {
        let err: RuleError = ValidationError::NameRequired.into();
        assert_eq!(err.to_string(), "Element name is required");
    }
}
