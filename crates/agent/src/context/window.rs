//! Bounded conversation window.
//!
//! Messages are grouped into chunks keyed by step number. The model only ever
//! sees the most recent `lookback` chunks, plus the task instructions from
//! chunk 1, which are never evicted.

use screenpilot_core::message::AgentMessage;
use screenpilot_core::tool::MessageHistory;
use std::collections::BTreeMap;

/// Append-only store of per-step message chunks.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    chunks: BTreeMap<u32, Vec<AgentMessage>>,
    lookback: usize,
}

impl ConversationWindow {
    pub fn new(lookback: usize) -> Self {
        Self {
            chunks: BTreeMap::new(),
            lookback: lookback.max(1),
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Append messages to the chunk for `step`, creating it if needed.
    pub fn record(&mut self, step: u32, messages: impl IntoIterator<Item = AgentMessage>) {
        self.chunks.entry(step).or_default().extend(messages);
    }

    /// The context the model sees at `step`.
    ///
    /// The most recent `lookback` chunks up to and including `step`, in
    /// ascending order. When chunk 1 falls outside that range, its user
    /// messages are prepended.
    pub fn view(&self, step: u32) -> Vec<AgentMessage> {
        let recent: Vec<(&u32, &Vec<AgentMessage>)> =
            self.chunks.range(..=step).rev().take(self.lookback).collect();

        let mut view = Vec::new();
        let has_first = recent.iter().any(|(s, _)| **s == 1);
        if !has_first && let Some(first) = self.chunks.get(&1) {
            view.extend(first.iter().filter(|m| m.is_user()).cloned());
        }
        for (_, messages) in recent.into_iter().rev() {
            view.extend(messages.iter().cloned());
        }
        view
    }

    pub fn chunk(&self, step: u32) -> Option<&[AgentMessage]> {
        self.chunks.get(&step).map(Vec::as_slice)
    }

    /// Number of chunks recorded.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Every recorded message in step order, borrowed chunk by chunk.
impl MessageHistory for ConversationWindow {
    fn messages(&self) -> Box<dyn Iterator<Item = &AgentMessage> + '_> {
        Box::new(self.chunks.values().flatten())
    }
}
