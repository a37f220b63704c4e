//! CSS selectors
//!
//! - `escape`: CSSOM identifier escaping
//! - `css`: selector matching over the in-memory document
//! - `generate`: the unique-selector generator used by the picker

mod css;
mod escape;
mod generate;

pub use css::SelectorList;
pub use escape::css_escape;
pub use generate::SelectorGenerator;

use std::fmt;

/// Why an element cannot be turned into a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRejection {
    /// No element was supplied
    Missing,
    /// The document's `<html>` element
    DocumentRoot,
    Body,
    /// The element lives in a nested browsing context
    ForeignDocument,
}

impl fmt::Display for TargetRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Missing => "no element",
            Self::DocumentRoot => "the document root cannot be selected",
            Self::Body => "the body cannot be selected",
            Self::ForeignDocument => "elements inside frames cannot be selected",
        };
        f.write_str(reason)
    }
}

/// Error type for selector parsing and generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Invalid target: {0}")]
    InvalidTarget(TargetRejection),

    #[error("Selector exceeds {max} characters ({len})")]
    TooLong { len: usize, max: usize },

    #[error("Invalid selector '{selector}': {reason}")]
    Syntax { selector: String, reason: String },
}
