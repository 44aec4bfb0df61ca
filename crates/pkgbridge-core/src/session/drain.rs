//! In-flight handler tracking for drain-before-close

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error};

use super::stdin::StdinWriter;

#[derive(Default)]
struct InFlightInner {
    count: AtomicUsize,
    idle: Notify,
}

/// Count of control-stream handlers that may still write to stdin.
///
/// A guard is held from the moment a line is read until everything it
/// triggered (including the answer to a completed frame) is finished.
#[derive(Clone, Default)]
pub struct InFlight {
    inner: Arc<InFlightInner>,
}

impl InFlight {
    /// Create a tracker with nothing in flight
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one in-flight handler
    #[must_use]
    pub fn enter(&self) -> InFlightGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            inner: self.inner.clone(),
        }
    }

    /// Current number of in-flight handlers
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Wait until nothing is in flight. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.idle()).await.is_ok()
    }

    async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the in-flight count when dropped
pub struct InFlightGuard {
    inner: Arc<InFlightInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Close `stdin` only after every in-flight handler has finished.
///
/// If the handlers are still running at `timeout`, stdin is force-closed
/// and false is returned.
pub async fn close_after_drain(inflight: &InFlight, stdin: &StdinWriter, timeout: Duration) -> bool {
    let drained = inflight.wait_idle(timeout).await;
    if drained {
        debug!("Drain complete; closing worker stdin");
    } else {
        error!(
            in_flight = inflight.count(),
            timeout_secs = timeout.as_secs(),
            "Drain timed out; force-closing worker stdin"
        );
    }
    stdin.close().await;
    drained
}
