//! Session setup server.
//!
//! # Architecture Overview
//!
//! ```text
//!  Handshake ──▶ http server ──▶ SetupGate ──(once)──▶ SessionInitializer
//!                                    │                        │
//!                                    │ owns                   │ add()
//!                                    ▼                        ▼
//!  Stop ───────▶ http server ──▶ Stopper::fire ──close──▶ StopChan per task
//!                                    │
//!                                    └──▶ graceful shutdown, drain session tasks
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use session_setup::config::{load_config, ServiceConfig};
use session_setup::lifecycle::{SessionInitializer, SessionTasks};
use session_setup::observability::{logging, metrics};
use session_setup::{RpcServer, SetupGate};

#[derive(Parser)]
#[command(name = "session-server")]
#[command(about = "Serves the session handshake and stop RPCs", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        required_credential_hosts = ?config.session.required_credential_hosts,
        request_timeout_secs = config.timeouts.request_secs,
        "session-server starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tasks = Arc::new(SessionTasks::new());
    let initializer = SessionInitializer::new(config.session.clone(), tasks.clone());
    let gate = Arc::new(SetupGate::new(move |ctx, request, stopper| {
        initializer.initialize(ctx, request, stopper)
    }));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown_timeout = Duration::from_secs(config.session.shutdown_timeout_secs);
    let server = RpcServer::new(config, gate);
    server.run(listener).await?;

    if !tasks.drain(shutdown_timeout).await {
        tracing::warn!("Forced exit with session tasks still running");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
