//! Remote agent clients for Parley.
//!
//! Both clients implement the `parley_core::RemoteAgent` trait over HTTP.
//! They share one [`transport::AgentTransport`], which owns the per-call
//! timeout and the explicit [`RetryPolicy`].

pub mod responder;
pub mod retry;
pub mod subject;
pub mod transport;

pub use responder::HttpResponderClient;
pub use retry::RetryPolicy;
pub use subject::HttpSubjectClient;
pub use transport::AgentTransport;
