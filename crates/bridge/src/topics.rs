//! Round-robin topic rotation.

use parley_core::BridgeError;
use std::sync::Arc;

/// Cycles through a fixed topic list. The cursor is always in `[0, len)`.
#[derive(Debug, Clone)]
pub struct TopicScheduler {
    topics: Arc<[String]>,
    cursor: usize,
}

impl TopicScheduler {
    pub fn new(topics: Arc<[String]>) -> Result<Self, BridgeError> {
        if topics.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "topic list must not be empty".into(),
            ));
        }
        Ok(Self { topics, cursor: 0 })
    }

    /// The topic at the cursor; advances the cursor.
    pub fn next(&mut self) -> String {
        let topic = self.topics[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.topics.len();
        topic
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
