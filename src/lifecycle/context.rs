//! Cancellable context shared by every lifecycle task.
//!
//! A [`Context`] is a cheap, cloneable handle around a
//! [`CancellationToken`] plus a write-once slot for the reason it was
//! cancelled. A context may also carry a deadline, after which it reports
//! [`CancelReason::DeadlineExceeded`] without anybody calling `cancel`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context finished.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CancelReason {
    /// Cancelled explicitly by its owner.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A task in the owning group failed.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The server returned from its serve loop.
    #[error("server stopped")]
    ServerStopped,

    /// The signal watcher finished its stop attempt.
    #[error("shutdown attempt finished")]
    ShutdownFinished,
}

#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    reason: OnceLock<CancelReason>,
    deadline: Option<Instant>,
}

/// Cancellable handle threaded through all task entry points.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Create a fresh root context that is never cancelled on its own.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a fresh root context bounded by `timeout`.
    ///
    /// The new context does not inherit anything from existing contexts, so
    /// it stays live even when the caller's own context is already cancelled.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    fn build(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                reason: OnceLock::new(),
                deadline,
            }),
        }
    }

    /// Cancel the context. Only the first reason is kept; later calls are no-ops.
    pub fn cancel(&self, reason: CancelReason) {
        let rendered = reason.to_string();
        if self.inner.reason.set(reason).is_ok() {
            tracing::debug!(reason = %rendered, "Context cancelled");
        }
        self.inner.token.cancel();
    }

    /// Wait until the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }

    /// The reason the context finished, or `None` while it is still live.
    pub fn err(&self) -> Option<CancelReason> {
        if let Some(reason) = self.inner.reason.get() {
            return Some(reason.clone());
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Non-blocking check for completion.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Time left before the deadline. `None` for contexts without one.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
