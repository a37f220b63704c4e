//! Change-reaction loop
//!
//! Keeps hidden elements hidden while the page mutates:
//!
//! 1. [`MutationFilter`] drops records caused by the tool itself.
//! 2. [`Debouncer`] coalesces bursts of significant records into one deadline.
//! 3. When the deadline passes the caller resolves the active rules and calls
//!    [`ReactionLoop::reapply`], which disconnects the observer for the
//!    duration of the DOM edits through an [`ObserverPause`] guard.
//!
//! Time is passed in as milliseconds so the loop runs the same under a
//! browser clock, a tokio clock or a test.

use std::ops::{Deref, DerefMut};

use log::debug;

use crate::config::EngineConfig;
use crate::dom::{Dom, MutationRecord, MutationSource, ObserveOptions};
use crate::hiding::{ApplyReport, HidingEngine};
use crate::markers::ToolMarkers;
use crate::types::BlockElement;

// =============================================================================
// Mutation Filter
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MutationFilter {
    markers: ToolMarkers,
}

impl MutationFilter {
    pub fn new(markers: ToolMarkers) -> Self {
        Self { markers }
    }

    /// Whether the record should trigger a reapplication.
    pub fn is_significant<D: Dom>(&self, dom: &D, record: &MutationRecord<D::Node>) -> bool {
        if self.markers.is_tool_element(dom, record.target()) {
            return false;
        }

        match record {
            MutationRecord::ChildList { added, .. } => *added > 0,
            MutationRecord::Attributes { target, name, old_value } => match name.as_str() {
                "class" => {
                    let before = old_value.as_deref().unwrap_or("");
                    let after = dom.attribute(target, "class").unwrap_or_default();
                    self.page_class_set(before) != self.page_class_set(&after)
                }
                "id" => true,
                other => other.starts_with("data-"),
            },
        }
    }

    pub fn any_significant<D: Dom>(&self, dom: &D, records: &[MutationRecord<D::Node>]) -> bool {
        records.iter().any(|record| self.is_significant(dom, record))
    }

    /// Sorted, de-duplicated classes with the markers removed.
    fn page_class_set<'a>(&self, value: &'a str) -> Vec<&'a str> {
        let mut classes: Vec<&str> = value
            .split_whitespace()
            .filter(|class| !self.markers.is_marker_class(class))
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

// =============================================================================
// Debouncer
// =============================================================================

/// Trailing-edge debounce over caller-supplied timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    delay_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self { delay_ms, deadline: None }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Restart the quiet period at `now`.
    pub fn trigger(&mut self, now_ms: u64) -> u64 {
        let deadline = now_ms.saturating_add(self.delay_ms);
        self.deadline = Some(deadline);
        deadline
    }

    /// Fires at most once per quiet period.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// The host timer for the pending period has elapsed. Fires whenever a
    /// period is pending, whatever the caller's clock reads now.
    pub fn fire(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

// =============================================================================
// Observer Pause
// =============================================================================

/// Disconnects the observer on creation and restores it on drop, so edits
/// made through the guard never produce records.
pub struct ObserverPause<'a, M: MutationSource> {
    source: &'a mut M,
    resume: Option<ObserveOptions>,
}

impl<'a, M: MutationSource> ObserverPause<'a, M> {
    pub fn new(source: &'a mut M) -> Self {
        let resume = source.observed();
        source.disconnect();
        Self { source, resume }
    }
}

impl<M: MutationSource> Deref for ObserverPause<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        &*self.source
    }
}

impl<M: MutationSource> DerefMut for ObserverPause<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut *self.source
    }
}

impl<M: MutationSource> Drop for ObserverPause<'_, M> {
    fn drop(&mut self) {
        if let Some(options) = self.resume {
            self.source.observe(options);
        }
    }
}

// =============================================================================
// Reaction Loop
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReactionLoop {
    filter: MutationFilter,
    debouncer: Debouncer,
    engine: HidingEngine,
}

impl Default for ReactionLoop {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ReactionLoop {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            filter: MutationFilter::new(ToolMarkers::from_config(config)),
            debouncer: Debouncer::new(config.debounce_ms),
            engine: HidingEngine::from_config(config),
        }
    }

    pub fn engine(&self) -> &HidingEngine {
        &self.engine
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Observe the body: subtree child lists and attributes with old values.
    pub fn start<M: MutationSource>(&self, source: &mut M) {
        source.observe(ObserveOptions::STANDARD);
    }

    pub fn stop<M: MutationSource>(&mut self, source: &mut M) {
        source.disconnect();
        self.debouncer.cancel();
    }

    /// Feed a batch of observer records. Returns the new deadline when the
    /// batch contained a significant change.
    pub fn on_mutations<D: Dom>(&mut self, dom: &D, records: &[MutationRecord<D::Node>], now_ms: u64) -> Option<u64> {
        if !self.filter.any_significant(dom, records) {
            return None;
        }
        Some(self.debouncer.trigger(now_ms))
    }

    /// Whether a reapplication is due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        self.debouncer.poll(now_ms)
    }

    /// The host's debounce timer elapsed; see [`Debouncer::fire`].
    pub fn fire(&mut self) -> bool {
        self.debouncer.fire()
    }

    /// Unhide everything and apply `active` with the observer paused.
    pub fn reapply<D: Dom + MutationSource>(&self, dom: &mut D, active: &[BlockElement]) -> ApplyReport {
        let mut paused = ObserverPause::new(dom);
        let report = self.engine.reapply(&mut *paused, active);
        debug!("reapplied {} active rules", active.len());
        report
    }
}
