//! Repetition detection on the Responder's output.

use std::collections::VecDeque;

/// How many recent outputs are remembered.
const HISTORY_LEN: usize = 10;

/// How many identical trailing outputs make a stall.
const STALL_RUN: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct StallDetector {
    recent: VecDeque<String>,
}

impl StallDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one Responder output.
    pub fn observe(&mut self, output: &str) {
        if self.recent.len() == HISTORY_LEN {
            self.recent.pop_front();
        }
        self.recent.push_back(output.trim().to_string());
    }

    /// True when the last three outputs are identical after trimming.
    pub fn is_stalled(&self) -> bool {
        if self.recent.len() < STALL_RUN {
            return false;
        }
        let mut tail = self.recent.iter().rev().take(STALL_RUN);
        match tail.next() {
            Some(last) => tail.all(|output| output == last),
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}
