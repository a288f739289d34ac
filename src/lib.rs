//! Session setup service library.
//!
//! A run-once handshake gate and a broadcast stop signal for long-lived RPC
//! sessions, plus the HTTP frontend and lifecycle plumbing that serve them.

// Core
pub mod protocol;
pub mod setup;

// Transport
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::RpcServer;
pub use setup::{HandshakeError, RequestContext, SetupGate, StopChan, Stopper};
