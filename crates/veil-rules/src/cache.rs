//! Read-through cache of the rule collections.
//!
//! Owned by the coordinator. The writer that just changed the store refills
//! or invalidates it; a storage-change notification invalidates it wholesale.

use serde::Serialize;
use veil_core::{BlockElement, Preset, Settings};

/// Snapshot of all three collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSnapshot {
    pub block_elements: Vec<BlockElement>,
    pub presets: Vec<Preset>,
    pub settings: Settings,
}

#[derive(Debug, Default)]
pub struct RuleCache {
    snapshot: Option<RuleSnapshot>,
    generation: u64,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&RuleSnapshot> {
        self.snapshot.as_ref()
    }

    /// Store `snapshot` only if nothing invalidated the cache since
    /// `generation` was read, so a slow reader cannot restore stale data.
    pub fn fill(&mut self, generation: u64, snapshot: RuleSnapshot) -> bool {
        if generation != self.generation {
            return false;
        }
        self.snapshot = Some(snapshot);
        true
    }

    pub fn invalidate(&mut self) {
        self.snapshot = None;
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_warm(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> RuleSnapshot {
        RuleSnapshot {
            block_elements: Vec::new(),
            presets: Vec::new(),
            settings: Settings::default(),
        }
    }

    #[test]
    fn test_fill_and_invalidate() {
        let mut cache = RuleCache::new();
        assert!(!cache.is_warm());

        assert!(cache.fill(cache.generation(), snapshot()));
        assert!(cache.is_warm());

        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_stale_fill_is_dropped() {
        let mut cache = RuleCache::new();
        let read_at = cache.generation();
        cache.invalidate();
        assert!(!cache.fill(read_at, snapshot()));
        assert!(!cache.is_warm());
    }
}
