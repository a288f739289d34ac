//! RPC server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the setup service handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Dispatch Handshake and Stop to the setup gate
//! - Shut down once the session stops or the process is signalled

use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::request::context_from_headers;
use crate::http::response::ApiError;
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::protocol::{HandshakeRequest, ServerCapabilities, StopRequest, StopResponse};
use crate::setup::{HandshakeError, SetupGate, StopChan, Stopper};

pub const HANDSHAKE_PATH: &str = "/rpc/v1/setup/handshake";
pub const STOP_PATH: &str = "/rpc/v1/setup/stop";

/// Application state injected into handlers.
pub struct AppState<E> {
    pub gate: Arc<SetupGate<E>>,
}

impl<E> Clone for AppState<E> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

/// HTTP frontend for the setup service.
pub struct RpcServer {
    router: Router,
    config: ServiceConfig,
    stopper: Stopper,
}

impl RpcServer {
    /// Create a new server in front of `gate`.
    pub fn new<E>(config: ServiceConfig, gate: Arc<SetupGate<E>>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let stopper = gate.stopper().clone();
        let router = Self::build_router(&config, AppState { gate });
        Self {
            router,
            config,
            stopper,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router<E>(config: &ServiceConfig, state: AppState<E>) -> Router
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Router::new()
            .route(HANDSHAKE_PATH, post(handshake_handler::<E>))
            .route(STOP_PATH, post(stop_handler::<E>))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns after the session stops (via the Stop RPC or an OS signal) and
    /// in-flight requests have completed.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "RPC server starting");

        let stop = self.stopper.add();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(stop, self.stopper))
            .await?;

        tracing::info!("RPC server stopped");
        Ok(())
    }

    /// A clone of the router, for driving the service without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

async fn handshake_handler<E>(
    State(state): State<AppState<E>>,
    headers: HeaderMap,
    Json(request): Json<HandshakeRequest>,
) -> Result<Json<ServerCapabilities>, ApiError>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let start = Instant::now();
    let ctx = context_from_headers(&headers);
    let request_id = ctx.request_id();

    match state.gate.handshake(ctx, request).await {
        Ok(capabilities) => {
            metrics::record_handshake("ok", start);
            tracing::info!(request_id = %request_id, "Handshake completed");
            Ok(Json(capabilities))
        }
        Err(err @ HandshakeError::AlreadyHandshaked) => {
            metrics::record_handshake("already_handshaked", start);
            tracing::warn!(request_id = %request_id, "Rejected repeated handshake");
            Err(ApiError::already_handshaked(err))
        }
        Err(HandshakeError::Initializer(e)) => {
            metrics::record_handshake("initializer_failed", start);
            tracing::warn!(request_id = %request_id, error = %e, "Session initializer failed");
            Err(ApiError::initializer_failed(e))
        }
    }
}

async fn stop_handler<E>(
    State(state): State<AppState<E>>,
    headers: HeaderMap,
    Json(request): Json<StopRequest>,
) -> Json<StopResponse>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let start = Instant::now();
    let ctx = context_from_headers(&headers);

    let (response, released) = state.gate.stop(&ctx, request);

    metrics::record_stop(released, start);
    tracing::info!(request_id = %ctx.request_id(), released, "Session stop requested");
    Json(response)
}

/// Wait for the session to stop, or for an OS signal to stop it.
async fn shutdown_signal(stop: StopChan, stopper: Stopper) {
    tokio::select! {
        _ = stop => tracing::info!("Session stopped, shutting down"),
        _ = signals::wait_for_termination() => {
            tracing::info!("Shutdown signal received");
            stopper.fire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::ErrorBody;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use thiserror::Error;
    use tower::ServiceExt;

    #[derive(Debug, Error)]
    #[error("initializer exploded")]
    struct Exploded;

    fn post_json(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn server<E, F>(result: F) -> RpcServer
    where
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Result<ServerCapabilities, E> + Send + 'static,
    {
        let gate: SetupGate<E> = SetupGate::new(move |_, _, _| async move { result() });
        RpcServer::new(ServiceConfig::default(), Arc::new(gate))
    }

    #[tokio::test]
    async fn test_handshake_route_then_conflict() {
        let server = server(|| {
            Ok::<_, Exploded>(ServerCapabilities {
                server_version: "1.2.3".into(),
                features: vec![],
            })
        });

        let response = server
            .router()
            .oneshot(post_json(HANDSHAKE_PATH, "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let caps: ServerCapabilities = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(caps.server_version, "1.2.3");

        let response = server
            .router()
            .oneshot(post_json(HANDSHAKE_PATH, "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, "already_handshaked");
        assert!(body.message.contains("handshake already completed"));
    }

    #[tokio::test]
    async fn test_initializer_error_maps_to_500() {
        let server = server(|| Err::<ServerCapabilities, _>(Exploded));
        let response = server
            .router()
            .oneshot(post_json(HANDSHAKE_PATH, "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, "initializer_failed");
        assert_eq!(body.message, "initializer exploded");
    }

    #[tokio::test]
    async fn test_stop_route_fires_stopper() {
        let server = server(|| Ok::<_, Exploded>(ServerCapabilities::default()));
        let mut chan = server.stopper.add();

        let response = server
            .router()
            .oneshot(post_json(STOP_PATH, "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(chan.is_stopped());
        assert!(server.stopper.is_fired());

        // Stop is repeatable, and a repeat has nothing left to release.
        let response = server
            .router()
            .oneshot(post_json(STOP_PATH, "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(server.stopper.fire(), 0);
    }
}
