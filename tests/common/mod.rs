//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use session_setup::config::ServiceConfig;
use session_setup::{RpcServer, SetupGate};

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait for the server to finish shutting down.
    #[allow(dead_code)]
    pub async fn join(self) {
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not shut down")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

/// Start an RPC server in front of `gate`.
pub async fn start_server<E>(gate: Arc<SetupGate<E>>) -> TestServer
where
    E: std::error::Error + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RpcServer::new(ServiceConfig::default(), gate);
    let handle = tokio::spawn(server.run(listener));
    TestServer { addr, handle }
}

/// An HTTP client that does not keep idle connections around.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
