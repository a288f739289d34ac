//! Tracking of session-scoped background tasks.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Background tasks started on behalf of a session.
///
/// The stopper tells these tasks to finish; `drain` lets the terminator wait
/// for them to actually do so.
#[derive(Debug, Default)]
pub struct SessionTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task and track it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        metrics::record_session_tasks(handles.len());
    }

    /// Number of tracked tasks that have not finished.
    pub fn active(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every tracked task, up to `timeout`.
    ///
    /// Returns true if all tasks finished in time. Tasks still running at the
    /// deadline are aborted.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let handles = std::mem::take(
            &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if handles.is_empty() {
            return true;
        }

        tracing::info!(tasks = handles.len(), "Draining session tasks");
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

        let finished = match tokio::time::timeout(timeout, futures_util::future::join_all(handles)).await {
            Ok(results) => {
                for err in results.into_iter().filter_map(Result::err) {
                    tracing::warn!(error = %err, "Session task ended abnormally");
                }
                true
            }
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Session tasks did not finish before deadline");
                for abort in aborts {
                    abort.abort();
                }
                false
            }
        };

        metrics::record_session_tasks(0);
        finished
    }
}
