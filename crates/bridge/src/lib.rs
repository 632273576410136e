//! The Parley bridge.
//!
//! Relays a conversation between a Responder and a Subject agent, keeps a
//! bounded context window, breaks repetition loops, rotates topics, and
//! writes each run to a durable session log.

pub mod context_window;
pub mod orchestrator;
pub mod recorder;
pub mod session;
pub mod stall;
pub mod topics;

pub use context_window::ContextWindow;
pub use orchestrator::{Bridge, BridgeSettings, MAX_LOOP_BREAK_ATTEMPTS};
pub use recorder::{JsonFileStore, SessionRecorder, SessionStore};
pub use session::{
    LogPage, Phase, Session, StartParams, StartReceipt, StartRequest, StatusReport, StopReceipt,
};
pub use stall::StallDetector;
pub use topics::TopicScheduler;
