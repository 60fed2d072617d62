//! Coordinator: runs the server and the signal watcher as one task group.
//!
//! # Data Flow
//! ```text
//! Context::new()
//!     → spawn runner  (server.start, cancels context on return)
//!     → spawn watcher (signal → bounded stop | context done, then cancels context)
//!     → group.wait()  (first error cancels the context)
//!     → confirmation.wait()
//!     → "all server shutdown"
//! ```

use std::process::ExitCode;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::lifecycle::context::{CancelReason, Context};
use crate::lifecycle::group::{GroupError, TaskGroup};
use crate::lifecycle::server::Server;
use crate::lifecycle::shutdown::{self, ShutdownError};
use crate::lifecycle::signals::{SignalSource, SignalWatcher, WatchOutcome, DEFAULT_SHUTDOWN_TIMEOUT};

/// Aggregate result of a coordinator run.
#[derive(Debug)]
pub struct Outcome<E> {
    /// First failure reported by the task group.
    pub result: Result<(), GroupError<E>>,
    /// How the watcher ended, if it reported back.
    pub watch: Option<WatchOutcome>,
    /// Result of waiting for the shutdown confirmation.
    pub confirmation: Result<(), ShutdownError>,
}

impl<E> Outcome<E> {
    /// True when every task finished cleanly and shutdown was confirmed.
    pub fn is_success(&self) -> bool {
        self.result.is_ok() && self.confirmation.is_ok()
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Owns the shared context and drives both lifecycle tasks.
pub struct Coordinator<S> {
    server: S,
    shutdown_timeout: Duration,
}

impl<S: Server> Coordinator<S> {
    pub fn new(server: S) -> Self {
        Self {
            server,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Bound applied to the server's graceful stop.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Run with a fresh root context.
    pub async fn run<Src: SignalSource>(self, signals: Src) -> Outcome<S::Error> {
        self.run_with_context(Context::new(), signals).await
    }

    /// Run under a caller-supplied context. Cancelling it from outside
    /// releases both tasks without a graceful stop.
    pub async fn run_with_context<Src: SignalSource>(
        self,
        ctx: Context,
        signals: Src,
    ) -> Outcome<S::Error> {
        let (confirmer, mut confirmation) = shutdown::confirmation();
        let (watch_tx, watch_rx) = oneshot::channel();
        let mut group = TaskGroup::with_context(ctx.clone());

        let server = self.server.clone();
        let runner_ctx = ctx.clone();
        group.spawn(async move {
            // Only the watcher issues stop. A context cancelled while the
            // server is still serving abandons the serve loop instead.
            let result = tokio::select! {
                result = server.start() => result,
                _ = runner_ctx.done() => {
                    tracing::warn!(
                        reason = %runner_ctx.err().unwrap_or(CancelReason::Canceled),
                        "Context done while serving, abandoning server"
                    );
                    Ok(())
                }
            };
            match &result {
                Ok(()) => runner_ctx.cancel(CancelReason::ServerStopped),
                Err(e) => runner_ctx.cancel(CancelReason::TaskFailed(e.to_string())),
            }
            result
        });

        let watcher =
            SignalWatcher::new(self.server.clone()).with_shutdown_timeout(self.shutdown_timeout);
        let watcher_ctx = ctx.clone();
        group.spawn(async move {
            let outcome = watcher.watch(watcher_ctx.clone(), signals, confirmer).await;
            // A drain that outlived its deadline leaves the serve loop running;
            // release the runner now that the bounded stop is over.
            watcher_ctx.cancel(CancelReason::ShutdownFinished);
            let _ = watch_tx.send(outcome);
            Ok::<(), S::Error>(())
        });

        let result = group.wait().await;
        if let Err(e) = &result {
            ctx.cancel(CancelReason::TaskFailed(e.to_string()));
            tracing::error!(error = %e, "Task group failed");
        }

        let confirmation = confirmation.wait().await;
        if let Err(e) = &confirmation {
            tracing::error!(error = %e, "Shutdown was never confirmed");
        }

        ctx.cancel(CancelReason::Canceled);
        let watch = watch_rx.await.ok();

        tracing::info!(success = result.is_ok(), "Coordinator finished");
        Outcome {
            result,
            watch,
            confirmation,
        }
    }
}
