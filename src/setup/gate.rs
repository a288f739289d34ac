//! Run-once handshake gate.

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use crate::protocol::{HandshakeRequest, ServerCapabilities, StopRequest, StopResponse};
use crate::setup::context::RequestContext;
use crate::setup::error::HandshakeError;
use crate::setup::stopper::Stopper;

type Initializer<E> = Box<
    dyn FnOnce(
            RequestContext,
            HandshakeRequest,
            Stopper,
        ) -> BoxFuture<'static, Result<ServerCapabilities, E>>
        + Send,
>;

/// Gates a session's one-time initialization and its stop signal.
///
/// The initializer slot doubles as the state flag: `Some` means no handshake
/// has claimed the session yet.
pub struct SetupGate<E> {
    initializer: Mutex<Option<Initializer<E>>>,
    stopper: Stopper,
}

impl<E> SetupGate<E> {
    /// Create a gate around `initializer`.
    ///
    /// The initializer receives the gate's [`Stopper`] and may register
    /// subscriptions on it for any background work it starts.
    pub fn new<F, Fut>(initializer: F) -> Self
    where
        F: FnOnce(RequestContext, HandshakeRequest, Stopper) -> Fut + Send + 'static,
        Fut: Future<Output = Result<ServerCapabilities, E>> + Send + 'static,
    {
        let initializer: Initializer<E> = Box::new(
            move |ctx: RequestContext,
                  req: HandshakeRequest,
                  stopper: Stopper|
                  -> BoxFuture<'static, Result<ServerCapabilities, E>> {
                Box::pin(initializer(ctx, req, stopper))
            },
        );

        Self {
            initializer: Mutex::new(Some(initializer)),
            stopper: Stopper::new(),
        }
    }

    /// Run the initializer if no earlier handshake has.
    ///
    /// Concurrent callers that lose the race get
    /// [`HandshakeError::AlreadyHandshaked`] straight away, without waiting
    /// for the winner's initializer to finish.
    pub async fn handshake(
        &self,
        ctx: RequestContext,
        request: HandshakeRequest,
    ) -> Result<ServerCapabilities, HandshakeError<E>> {
        let claimed = self
            .initializer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(initializer) = claimed else {
            return Err(HandshakeError::AlreadyHandshaked);
        };

        tracing::debug!(request_id = %ctx.request_id(), "Handshake claimed session");

        initializer(ctx, request, self.stopper.clone())
            .await
            .map_err(HandshakeError::Initializer)
    }

    /// Fire the session's stop signal.
    ///
    /// Safe before, during, or after a handshake, and safe to repeat. Also
    /// returns the number of subscriptions this call released, which is 0
    /// once the session has already stopped.
    pub fn stop(&self, ctx: &RequestContext, _request: StopRequest) -> (StopResponse, usize) {
        tracing::debug!(request_id = %ctx.request_id(), "Stop requested");
        let released = self.stopper.fire();
        (StopResponse {}, released)
    }

    /// The session's stopper. Identity is stable for the life of the gate.
    pub fn stopper(&self) -> &Stopper {
        &self.stopper
    }

    /// Returns true once a handshake has claimed the session.
    pub fn is_handshaked(&self) -> bool {
        self.initializer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientConfig, HostCredential};
    use crate::setup::stopper::StopChan;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use thiserror::Error;
    use tokio::sync::{oneshot, Notify};

    #[derive(Debug, Error, PartialEq)]
    #[error("bad credentials for {0}")]
    struct BadCredentials(String);

    fn request_with_token(host: &str, token: &str) -> HandshakeRequest {
        let mut credentials = HashMap::new();
        credentials.insert(host.to_string(), HostCredential::new(token));
        HandshakeRequest {
            config: ClientConfig { credentials },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_handshake_runs_initializer_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_token = Arc::new(Mutex::new(None));

        let gate = {
            let calls = calls.clone();
            let seen_token = seen_token.clone();
            SetupGate::<BadCredentials>::new(move |_ctx, req, _stopper| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                *seen_token.lock().unwrap() =
                    req.credential_token("localterraform.com").map(str::to_string);
                Ok(ServerCapabilities::default())
            })
        };

        let req = request_with_token("localterraform.com", "boop");
        gate.handshake(RequestContext::background(), req.clone())
            .await
            .expect("first handshake should succeed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen_token.lock().unwrap().as_deref(), Some("boop"));
        assert!(gate.is_handshaked());

        let err = gate
            .handshake(RequestContext::background(), req)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("handshake already completed"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handshake_returns_capabilities_unmodified() {
        let caps = ServerCapabilities {
            server_version: "9.9.9".into(),
            features: vec!["deferrals".into()],
        };
        let expected = caps.clone();
        let gate = SetupGate::<BadCredentials>::new(move |_, _, _| async move { Ok(caps) });

        let got = gate
            .handshake(RequestContext::background(), HandshakeRequest::default())
            .await
            .unwrap();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn test_initializer_error_passes_through() {
        let gate = SetupGate::new(|_, _, _| async {
            Err::<ServerCapabilities, _>(BadCredentials("example.com".into()))
        });

        let err = gate
            .handshake(RequestContext::background(), HandshakeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bad credentials for example.com");
        assert_eq!(
            err.into_initializer_error(),
            Some(BadCredentials("example.com".into()))
        );

        // A failed initializer still consumes the slot.
        let err = gate
            .handshake(RequestContext::background(), HandshakeRequest::default())
            .await
            .unwrap_err();
        assert!(err.is_already_handshaked());
    }

    #[tokio::test]
    async fn test_concurrent_handshake_rejected_while_initializer_runs() {
        let release = Arc::new(Notify::new());
        let (entered_tx, entered_rx) = oneshot::channel();

        let gate = {
            let release = release.clone();
            Arc::new(SetupGate::<BadCredentials>::new(move |_, _, _| async move {
                let _ = entered_tx.send(());
                release.notified().await;
                Ok(ServerCapabilities::default())
            }))
        };

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.handshake(RequestContext::background(), HandshakeRequest::default())
                    .await
            })
        };
        entered_rx.await.unwrap();

        let second = tokio::time::timeout(
            Duration::from_secs(1),
            gate.handshake(RequestContext::background(), HandshakeRequest::default()),
        )
        .await
        .expect("second handshake must not wait for the first");
        assert!(second.unwrap_err().is_already_handshaked());

        release.notify_one();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stop_releases_initializer_subscriptions() {
        let (stopper_tx, stopper_rx) = oneshot::channel();
        let gate = SetupGate::<BadCredentials>::new(move |_, _, stopper| async move {
            let _ = stopper_tx.send(stopper);
            Ok(ServerCapabilities::default())
        });

        gate.handshake(RequestContext::background(), HandshakeRequest::default())
            .await
            .unwrap();
        let stopper = stopper_rx.await.unwrap();
        assert!(stopper.ptr_eq(gate.stopper()));

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let chan = stopper.add();
                tokio::spawn(async move { chan.await })
            })
            .collect();

        let (_, released) = gate.stop(&RequestContext::background(), StopRequest {});
        assert_eq!(released, 2);

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("subscriber was not released")
                .unwrap();
        }
    }

    #[test]
    fn test_repeated_stop_releases_nothing() {
        let gate = SetupGate::<BadCredentials>::new(|_, _, _| async {
            Ok(ServerCapabilities::default())
        });
        let mut chans = [gate.stopper().add(), gate.stopper().add(), gate.stopper().add()];

        let (_, released) = gate.stop(&RequestContext::background(), StopRequest {});
        assert_eq!(released, 3);
        assert!(chans.iter_mut().all(StopChan::is_stopped));

        let (_, released) = gate.stop(&RequestContext::background(), StopRequest {});
        assert_eq!(released, 0);
    }

    #[tokio::test]
    async fn test_stop_without_handshake_is_harmless() {
        let gate = SetupGate::<BadCredentials>::new(|_, _, _| async {
            Ok(ServerCapabilities::default())
        });
        assert_eq!(gate.stop(&RequestContext::background(), StopRequest {}).1, 0);
        assert_eq!(gate.stop(&RequestContext::background(), StopRequest {}).1, 0);
        assert!(gate.stopper().is_fired());
        assert!(!gate.is_handshaked());

        // The stopper handed to a late initializer is already fired.
        let (tx, rx) = oneshot::channel();
        let gate = SetupGate::<BadCredentials>::new(move |_, _, stopper| async move {
            let mut chan = stopper.add();
            let _ = tx.send(chan.is_stopped());
            Ok(ServerCapabilities::default())
        });
        let _ = gate.stop(&RequestContext::background(), StopRequest {});
        gate.handshake(RequestContext::background(), HandshakeRequest::default())
            .await
            .unwrap();
        assert!(rx.await.unwrap());
    }
}
