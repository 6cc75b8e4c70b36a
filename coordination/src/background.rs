//! Cancellable background tasks
//!
//! Both the event dispatch loop and the context cleanup sweep are
//! long-lived tokio tasks that stop cooperatively. [`BackgroundTask`] owns
//! one such task together with its cancellation token. Dropping the
//! handle cancels the task, so a loop never outlives its owner.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// A spawned loop that can be cancelled and awaited
pub struct BackgroundTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    _cancel_on_drop: DropGuard,
}

impl BackgroundTask {
    /// Spawn `body` with a fresh cancellation token
    ///
    /// The body receives the token and must return once it is cancelled.
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(body(cancel.clone()));
        debug!(task = name, "Background task spawned");
        Self {
            name,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            handle,
        }
    }

    /// Whether the task is still running
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Request cancellation and wait for the task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        match self.handle.await {
            Ok(()) => debug!(task = self.name, "Background task stopped"),
            Err(e) if e.is_cancelled() => debug!(task = self.name, "Background task aborted"),
            Err(e) => warn!(task = self.name, "Background task ended abnormally: {}", e),
        }
    }
}
