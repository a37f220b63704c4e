//! Content-side controller
//!
//! Owns the per-page state of the content script: the reaction loop, the
//! picker and the rule store it resolves active rules from. Resolving is async
//! and applying is sync, so a host that keeps the controller behind a
//! `RefCell` never holds a borrow across an await.

use log::debug;

use veil_core::{
    ApplyReport, BlockElement, ClickOutcome, Dom, EngineConfig, MutationRecord, MutationSource, ObserverPause,
    PageLocation, PickedElement, Picker, PickerHost, ReactionLoop,
};

use crate::protocol::{Message, MessageType};
use crate::rules::RuleStore;
use crate::store::KeyValueStore;

/// What a message asked the content script to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAction {
    PickerStarted,
    PickerStopped,
    /// Resolve the active rules and reapply them
    Reapply,
    /// Not a content-script message
    Ignored,
}

pub struct ContentScript<S, H: PickerHost, N> {
    rules: RuleStore<S>,
    reaction: ReactionLoop,
    picker: Picker<H, N>,
    started: bool,
}

impl<S, H, N> ContentScript<S, H, N>
where
    S: KeyValueStore,
    H: PickerHost,
    N: Clone + PartialEq,
{
    pub fn new(rules: RuleStore<S>, host: H, config: &EngineConfig) -> Self {
        Self {
            rules,
            reaction: ReactionLoop::from_config(config),
            picker: Picker::new(host, config),
            started: false,
        }
    }

    pub fn rules(&self) -> &RuleStore<S> {
        &self.rules
    }

    pub fn reaction(&self) -> &ReactionLoop {
        &self.reaction
    }

    pub fn picker(&self) -> &Picker<H, N> {
        &self.picker
    }

    pub fn picker_mut(&mut self) -> &mut Picker<H, N> {
        &mut self.picker
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ===== Lifecycle =====

    /// Start observing. Returns `false` when already started; the caller then
    /// skips the initial reapplication.
    pub fn start<D>(&mut self, dom: &mut D) -> bool
    where
        D: Dom<Node = N> + MutationSource,
    {
        if self.started {
            return false;
        }
        self.started = true;
        self.reaction.start(dom);
        true
    }

    /// Stop observing and close the picker.
    pub fn shutdown<D>(&mut self, dom: &mut D)
    where
        D: Dom<Node = N> + MutationSource,
    {
        self.picker.stop(dom);
        self.reaction.stop(dom);
        self.started = false;
    }

    /// [`start`](Self::start) followed by the initial reapplication.
    pub async fn init<D>(&mut self, dom: &mut D, url: &str) -> Option<ApplyReport>
    where
        D: Dom<Node = N> + MutationSource,
    {
        if !self.start(dom) {
            return None;
        }
        Some(self.refresh(dom, url).await)
    }

    // ===== Rules =====

    pub async fn resolve_active(&self, url: &str) -> Vec<BlockElement> {
        self.rules.active_block_elements(url).await
    }

    pub fn apply<D>(&self, dom: &mut D, active: &[BlockElement]) -> ApplyReport
    where
        D: Dom<Node = N> + MutationSource,
    {
        self.reaction.reapply(dom, active)
    }

    pub async fn refresh<D>(&self, dom: &mut D, url: &str) -> ApplyReport
    where
        D: Dom<Node = N> + MutationSource,
    {
        let active = self.resolve_active(url).await;
        self.apply(dom, &active)
    }

    // ===== Mutations =====

    /// Feed observer records; returns the debounce deadline if rescheduled.
    pub fn on_mutations<D>(&mut self, dom: &D, records: &[MutationRecord<N>], now_ms: u64) -> Option<u64>
    where
        D: Dom<Node = N>,
    {
        self.reaction.on_mutations(dom, records, now_ms)
    }

    /// Whether the debounced reapplication is due.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        self.reaction.poll(now_ms)
    }

    /// The host's debounce timer elapsed. Returns whether a reapplication was pending.
    pub fn fire(&mut self) -> bool {
        self.reaction.fire()
    }

    // ===== Messages =====

    /// Act on a message from the background. Picker commands run
    /// immediately; rule changes ask the caller for a [`ContentAction::Reapply`].
    pub fn handle_message<D>(&mut self, dom: &mut D, message: &Message) -> ContentAction
    where
        D: Dom<Node = N> + MutationSource,
    {
        debug!("content received {}", message.kind.as_str());
        match message.kind {
            MessageType::StartPicker => {
                let mut paused = ObserverPause::new(dom);
                self.picker.start(&mut *paused);
                ContentAction::PickerStarted
            }
            MessageType::StopPicker => {
                let mut paused = ObserverPause::new(dom);
                self.picker.stop(&mut *paused);
                ContentAction::PickerStopped
            }
            MessageType::ApplyRules | MessageType::StateUpdated => ContentAction::Reapply,
            _ => ContentAction::Ignored,
        }
    }

    /// Forward a click to the picker. A pick is returned with the message to
    /// send to the background.
    pub fn click<D>(&mut self, dom: &mut D, target: Option<&N>, location: &PageLocation) -> (ClickOutcome, Option<Message>)
    where
        D: Dom<Node = N> + MutationSource,
    {
        let outcome = {
            let mut paused = ObserverPause::new(dom);
            self.picker.click(&mut *paused, target, location)
        };
        let message = match &outcome {
            ClickOutcome::Picked(picked) => Some(element_selected(picked)),
            _ => None,
        };
        (outcome, message)
    }
}

/// The `ELEMENT_SELECTED` message for a pick.
pub fn element_selected(picked: &PickedElement) -> Message {
    let payload = serde_json::to_value(picked).unwrap_or_default();
    Message::with_payload(MessageType::ElementSelected, payload)
}
