//! Veil Core Library
//!
//! This crate provides the page-side engine of the Veil element blocker: users pick
//! elements on a page, the picked elements are saved as named "block elements"
//! identified by CSS selectors, and the engine hides every element matched by an
//! active rule while the page keeps mutating.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O. The live document is reached through the
//! [`Dom`] trait so the same engine runs against the browser (see `veil-wasm`) and
//! against the arena-backed [`MemoryDom`] used by the CLI and the tests.
//!
//! # Modules
//!
//! - `pattern`: URL pattern matching (`site_wide`, `path_pattern`, `exact_page`)
//! - `selector`: CSS escaping, the selector engine and the unique-selector generator
//! - `dom`: the document abstraction, mutation records and the in-memory document
//! - `hiding`: applies and removes the hide marker class
//! - `reaction`: mutation filtering, debounce and the observer pause bracket
//! - `picker`: the interactive element picker state machine
//! - `markers`: detection of elements owned by the tool, element descriptions
//! - `config`: engine configuration
//! - `types`: shared record types

pub mod config;
pub mod dom;
pub mod hiding;
pub mod markers;
pub mod pattern;
pub mod picker;
pub mod reaction;
pub mod selector;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use dom::{Dom, MemoryDom, MutationRecord, MutationSource, NodeId, ObserveOptions};
pub use hiding::{ApplyReport, HidingEngine};
pub use markers::ToolMarkers;
pub use pattern::{matches, matches_str, PatternError};
pub use picker::{ClickOutcome, PageLocation, Picker, PickerHost, PickerState, Rejection};
pub use reaction::{Debouncer, MutationFilter, ObserverPause, ReactionLoop};
pub use selector::{css_escape, SelectorError, SelectorGenerator, SelectorList, TargetRejection};
pub use types::{BlockElement, ElementRect, PatternType, PickedElement, Preset, Settings, Theme};
