//! RPC payloads for the setup service.
//!
//! The gate treats these as opaque; only the initializer and the
//! transport look inside them.

pub mod types;

pub use types::{
    ClientCapabilities, ClientConfig, HandshakeRequest, HostCredential, ServerCapabilities,
    StopRequest, StopResponse,
};
