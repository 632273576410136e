//! Bounded record of recent dialogue, replayed to the Responder as history.

use parley_core::ContextPair;
use std::collections::VecDeque;

/// FIFO window of [`ContextPair`]s, oldest first.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    pairs: VecDeque<ContextPair>,
    capacity: usize,
}

impl ContextWindow {
    /// A window holding at most `capacity` pairs (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pairs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// A window sized for a history horizon of `horizon` pairs: keeps
    /// twice as many as are ever replayed.
    pub fn for_horizon(horizon: usize) -> Self {
        Self::with_capacity(horizon.saturating_mul(2))
    }

    pub fn push(&mut self, subject_text: impl Into<String>, responder_text: impl Into<String>) {
        if self.pairs.len() == self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back(ContextPair::new(subject_text, responder_text));
    }

    /// The most recent `limit` pairs, most recent last.
    pub fn recent_pairs(&self, limit: usize) -> Vec<ContextPair> {
        let skip = self.pairs.len().saturating_sub(limit);
        self.pairs.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}
