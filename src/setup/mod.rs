//! Session setup subsystem.
//!
//! # Data Flow
//! ```text
//! Service startup:
//!     SetupGate::new(initializer)
//!     → Stopper created, owned by the gate
//!
//! First Handshake RPC (gate.rs):
//!     Claim the single slot under lock
//!     → Run initializer(ctx, request, stopper) outside the lock
//!     → Initializer subscribes background work via stopper.add()
//!
//! Later Handshake RPCs:
//!     Slot already claimed → HandshakeError::AlreadyHandshaked
//!
//! Stop RPC:
//!     stopper.fire() (stopper.rs)
//!     → Every StopChan closes, future add() calls return closed channels
//! ```
//!
//! # Design Decisions
//! - The initializer runs at most once per gate, even under concurrent calls
//! - The lock covers the check-and-set only, never the initializer itself
//! - One stopper per session, not per call
//! - Stop never fails and never waits for subscribers

pub mod context;
pub mod error;
pub mod gate;
pub mod stopper;

pub use context::{RequestContext, RequestId};
pub use error::HandshakeError;
pub use gate::SetupGate;
pub use stopper::{StopChan, Stopper};
