//! Per-call context handed through to the initializer.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a single RPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh v4 request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Context of the call that triggered a gate operation.
///
/// The gate never inspects it; it is passed to the initializer as-is.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
}

impl RequestContext {
    pub fn new(request_id: RequestId) -> Self {
        Self { request_id }
    }

    /// Context for calls that do not come from the transport.
    pub fn background() -> Self {
        Self::new(RequestId::new())
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }
}
