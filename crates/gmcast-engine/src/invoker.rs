//! Per-peer task supervisor.
//!
//! Tracks every background task a peer spawns and provides a join-all
//! barrier for shutdown. Tasks observe cancellation through the watch
//! flag; a panicking task is logged without killing the process.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct InvokerInner {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Cloneable handle to the supervisor; all clones share the same task
/// registry and cancellation flag.
#[derive(Clone)]
pub struct Invoker {
    inner: Arc<InvokerInner>,
}

impl Invoker {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(InvokerInner {
                shutdown_tx,
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Launch a task under supervision.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.inner.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(tokio::spawn(future));
    }

    /// Receiver for the cancellation flag; `changed()` resolves once
    /// shutdown is signalled.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// Signal cancellation without waiting.
    pub fn signal(&self) {
        let _ = self.inner.shutdown_tx.send(true);
    }

    /// Wait until every supervised task has returned, including tasks
    /// spawned while the barrier is draining.
    pub async fn join(&self) {
        loop {
            let handle = self.inner.handles.lock().pop();
            match handle {
                Some(handle) => {
                    if let Err(err) = handle.await {
                        if err.is_panic() {
                            tracing::error!(error = %err, "supervised task panicked");
                        }
                    }
                }
                None => break,
            }
        }
    }
}

impl Default for Invoker {
    fn default() -> Self {
        Self::new()
    }
}
