//! Veil Rules
//!
//! Persistence and coordination on top of `veil-core`: typed access to the
//! stored block elements and presets, validation of user input, resolution of
//! the rules active on a page, and the background coordinator that routes
//! control messages between the popup and the tabs.
//!
//! # Modules
//!
//! - `store`: the key-value store capability and an in-memory store
//! - `rules`: the rule store adapter
//! - `validate`: drafts, validation and name sanitization
//! - `resolver`: active-rule resolution
//! - `cascade`: preset cleanup when a block element is deleted
//! - `collection`: per-record parsing of the stored collections
//! - `cache`: the coordinator's read-through cache
//! - `protocol`: control messages and replies
//! - `coordinator`: the background message router
//! - `content`: the content-script controller

pub mod cache;
pub mod cascade;
pub mod collection;
pub mod content;
pub mod coordinator;
pub mod error;
pub mod ids;
pub mod protocol;
pub mod resolver;
pub mod rules;
pub mod store;
pub mod validate;

pub use cache::{RuleCache, RuleSnapshot};
pub use cascade::{cascade_delete, CascadeReport};
pub use collection::{Collection, Keyed};
pub use content::{element_selected, ContentAction, ContentScript};
pub use coordinator::{Coordinator, DeliveryError, TabId, Tabs};
pub use error::{RecordKind, RuleError, StoreError, ValidationError};
pub use protocol::{Message, MessageType, Response};
pub use resolver::resolve;
pub use rules::RuleStore;
pub use store::{KeyValueStore, MemoryStore, Record, StorageChange};
pub use validate::{BlockElementDraft, PresetDraft};
