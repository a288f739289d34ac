//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Session (session.rs):
//!     First handshake → Check credentials → Spawn session tasks → Capabilities
//!
//! Shutdown (shutdown.rs):
//!     Stop fired → Session tasks observe StopChan → Drain with deadline
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Fire the session stopper
//! ```
//!
//! # Design Decisions
//! - Session tasks are owned by the session, not by individual RPCs
//! - The stop primitive never waits; draining is the terminator's choice
//! - Shutdown has timeout: stragglers are abandoned after the deadline

pub mod session;
pub mod shutdown;
pub mod signals;

pub use session::{SessionError, SessionInitializer};
pub use shutdown::SessionTasks;
