//! Stop broadcast for session-scoped work.
//!
//! # Responsibilities
//! - Hand out an independent one-shot channel per subscriber
//! - Close every registered channel when the session stops
//! - Serve registrations after the stop with already-closed channels
//!
//! # Design Decisions
//! - Channels are closed by dropping their sender; no value is ever sent
//! - Registration and firing share one lock, so no subscriber is lost
//! - The registry is emptied on fire; later `add()` calls use the fired flag
//! - Dropped subscribers are pruned once the registry doubles past its last
//!   pruned size, keeping `add()` amortized O(1)

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Registry size below which `add()` never prunes.
const MIN_PRUNE_AT: usize = 64;

#[derive(Debug, Default)]
struct Registry {
    fired: bool,
    subscribers: Vec<oneshot::Sender<()>>,
    /// Length at which the next `add()` prunes closed senders.
    prune_at: usize,
}

impl Registry {
    fn prune_if_due(&mut self) {
        if self.subscribers.len() < self.prune_at.max(MIN_PRUNE_AT) {
            return;
        }
        self.subscribers.retain(|sub| !sub.is_closed());
        self.prune_at = (2 * self.subscribers.len()).max(MIN_PRUNE_AT);
    }
}

/// Broadcasts a single stop signal to any number of subscribers.
///
/// Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct Stopper {
    inner: Arc<Mutex<Registry>>,
}

impl Stopper {
    /// Create a stopper that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // The registry is consistent after every statement, so a poisoned
        // lock is still safe to use.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber.
    ///
    /// If the stopper already fired, the returned channel is already closed.
    pub fn add(&self) -> StopChan {
        let (tx, rx) = oneshot::channel();
        let mut registry = self.registry();
        if !registry.fired {
            registry.prune_if_due();
            registry.subscribers.push(tx);
        }
        StopChan { rx, stopped: false }
    }

    /// Fire the stop signal, closing every registered channel.
    ///
    /// Returns the number of subscribers still waiting when it fired. Calling
    /// this more than once is a no-op that returns 0.
    pub fn fire(&self) -> usize {
        let subscribers = {
            let mut registry = self.registry();
            if registry.fired {
                return 0;
            }
            registry.fired = true;
            std::mem::take(&mut registry.subscribers)
        };

        let released = subscribers.iter().filter(|tx| !tx.is_closed()).count();
        tracing::debug!(subscribers = released, "Stop signal fired");
        drop(subscribers);
        released
    }

    /// Returns true once `fire()` has run.
    pub fn is_fired(&self) -> bool {
        self.registry().fired
    }

    /// Number of registered subscribers still waiting.
    pub fn subscriber_count(&self) -> usize {
        self.registry()
            .subscribers
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Returns true if both handles refer to the same stopper.
    pub fn ptr_eq(&self, other: &Stopper) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// One subscription to a [`Stopper`].
///
/// Await it to suspend until the stopper fires. Completes immediately if it
/// already has.
#[derive(Debug)]
#[must_use = "a StopChan does nothing unless awaited or checked"]
pub struct StopChan {
    rx: oneshot::Receiver<()>,
    stopped: bool,
}

impl StopChan {
    /// Non-blocking check for the stop signal.
    pub fn is_stopped(&mut self) -> bool {
        if !self.stopped {
            self.stopped = matches!(
                self.rx.try_recv(),
                Err(oneshot::error::TryRecvError::Closed)
            );
        }
        self.stopped
    }

    /// Block the current thread until the stopper fires.
    ///
    /// Panics if called from within an async runtime; await the channel there.
    pub fn blocking_wait(mut self) {
        if !self.stopped {
            let _ = self.rx.blocking_recv();
            self.stopped = true;
        }
    }
}

impl Future for StopChan {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.stopped {
            return Poll::Ready(());
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(_) => {
                self.stopped = true;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
