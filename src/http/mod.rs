//! RPC transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routes, middleware)
//!     → request.rs (request ID → RequestContext)
//!     → SetupGate (handshake / stop)
//!     → response.rs (map gate errors to status codes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{context_from_headers, X_REQUEST_ID};
pub use response::{ApiError, ErrorBody};
pub use server::{RpcServer, HANDSHAKE_PATH, STOP_PATH};
