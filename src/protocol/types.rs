//! Handshake and stop message definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// First message a client sends on a new session.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HandshakeRequest {
    /// What the client is able to do.
    pub capabilities: ClientCapabilities,

    /// Client-side configuration for the session.
    pub config: ClientConfig,
}

impl HandshakeRequest {
    /// Token the client supplied for `host`, if any.
    pub fn credential_token(&self, host: &str) -> Option<&str> {
        self.config
            .credentials
            .get(host)
            .map(|cred| cred.token.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientCapabilities {
    /// Optional protocol features the client understands.
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Credentials keyed by service hostname.
    pub credentials: HashMap<String, HostCredential>,
}

/// A credential for one service host.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct HostCredential {
    pub token: String,
}

impl HostCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl fmt::Debug for HostCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCredential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Returned to the client on a successful handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerCapabilities {
    /// Version of the serving binary.
    pub server_version: String,

    /// Optional protocol features the server enables for this session.
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StopRequest {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StopResponse {}
