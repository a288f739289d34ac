//! Session initialization for the setup service.
//!
//! # Responsibilities
//! - Check the client's credentials against the configured required hosts
//! - Start session-scoped background tasks bound to the stopper
//! - Build the server capabilities returned to the client

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::SessionConfig;
use crate::lifecycle::shutdown::SessionTasks;
use crate::protocol::{HandshakeRequest, ServerCapabilities};
use crate::setup::{RequestContext, StopChan, Stopper};

/// Errors raised while initializing a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("missing credential for required host {host}")]
    MissingCredential { host: String },

    #[error("empty credential token for host {host}")]
    EmptyToken { host: String },
}

/// The service's initializer, run once by the setup gate.
pub struct SessionInitializer {
    config: SessionConfig,
    tasks: Arc<SessionTasks>,
}

impl SessionInitializer {
    pub fn new(config: SessionConfig, tasks: Arc<SessionTasks>) -> Self {
        Self { config, tasks }
    }

    /// Set up the session.
    pub async fn initialize(
        self,
        ctx: RequestContext,
        request: HandshakeRequest,
        stopper: Stopper,
    ) -> Result<ServerCapabilities, SessionError> {
        for host in &self.config.required_credential_hosts {
            match request.credential_token(host) {
                None => return Err(SessionError::MissingCredential { host: host.clone() }),
                Some(token) if token.is_empty() => {
                    return Err(SessionError::EmptyToken { host: host.clone() })
                }
                Some(_) => {}
            }
        }

        let mut hosts: Vec<&str> = request
            .config
            .credentials
            .keys()
            .map(String::as_str)
            .collect();
        hosts.sort_unstable();

        tracing::info!(
            request_id = %ctx.request_id(),
            credential_hosts = ?hosts,
            client_features = ?request.capabilities.features,
            "Session initialized"
        );

        let interval = Duration::from_secs(self.config.heartbeat_secs.max(1));
        let stop = stopper.add();
        self.tasks.spawn(heartbeat(interval, stop));

        Ok(ServerCapabilities {
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            features: self.config.features,
        })
    }
}

/// Log a heartbeat on `interval` until the session stops.
async fn heartbeat(interval: Duration, mut stop: StopChan) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut beats: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                beats += 1;
                tracing::debug!(beats, "Session heartbeat");
            }
            _ = &mut stop => {
                tracing::info!(beats, "Session heartbeat received stop signal, exiting loop");
                break;
            }
        }
    }
}
