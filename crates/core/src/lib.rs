//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley conversation
//! bridge. This crate has **zero framework dependencies**. It defines the
//! domain model that the HTTP clients, the bridge loop and the gateway all
//! implement against.
//!
//! ## Design Philosophy
//!
//! The remote agents are reached through the [`RemoteAgent`] trait defined
//! here. Implementations live in `parley-agents`. This enables:
//! - Swapping the transport without touching the bridge loop
//! - Easy testing with scripted/stub agents
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent;
pub mod error;
pub mod exchange;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentReply, AgentRole, ConverseOptions, ConverseRequest, RemoteAgent};
pub use error::{AgentFailure, BridgeError, Error, FailureReason, Result};
pub use exchange::{ContextPair, Exchange, Metrics, SessionInfo, SessionLog};
