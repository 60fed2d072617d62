//! OS signal handling and the signal watcher task.
//!
//! # Responsibilities
//! - Register SIGHUP, SIGQUIT, SIGTERM and SIGINT
//! - Race signal delivery against context cancellation
//! - On a signal, run one bounded graceful stop of the server
//! - Confirm shutdown exactly once, whichever branch ran
//!
//! # Design Decisions
//! - All four signals are treated identically
//! - Stop failures are logged, never returned
//! - The stop deadline comes from a fresh context, not the (possibly cancelled) shared one

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::lifecycle::context::{CancelReason, Context};
use crate::lifecycle::server::{Server, StopError};
use crate::lifecycle::shutdown::Confirmer;

/// Default bound on the graceful stop procedure.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A signal that requests process termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Hangup,
    Quit,
    Terminate,
    Interrupt,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationSignal::Hangup => "SIGHUP",
            TerminationSignal::Quit => "SIGQUIT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Interrupt => "SIGINT",
        };
        f.write_str(name)
    }
}

/// Stream of termination signals.
pub trait SignalSource: Send + 'static {
    /// Next delivered signal, or `None` once the source is exhausted.
    fn recv(&mut self) -> impl Future<Output = Option<TerminationSignal>> + Send;
}

/// Process signal handlers for the fixed termination set.
#[derive(Debug)]
pub struct TerminationSignals {
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
    #[cfg(unix)]
    quit: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Install the handlers. Must be called from within a Tokio runtime.
    #[cfg(unix)]
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            quit: signal(SignalKind::quit())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {})
    }
}

impl SignalSource for TerminationSignals {
    #[cfg(unix)]
    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            Some(()) = self.hangup.recv() => Some(TerminationSignal::Hangup),
            Some(()) = self.quit.recv() => Some(TerminationSignal::Quit),
            Some(()) = self.terminate.recv() => Some(TerminationSignal::Terminate),
            Some(()) = self.interrupt.recv() => Some(TerminationSignal::Interrupt),
            else => None,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|()| TerminationSignal::Interrupt)
    }
}

/// Injected signals, used by embedders and tests.
impl SignalSource for mpsc::Receiver<TerminationSignal> {
    fn recv(&mut self) -> impl Future<Output = Option<TerminationSignal>> + Send {
        mpsc::Receiver::recv(self)
    }
}

/// Watcher state machine.
///
/// ```text
/// Waiting → ShuttingDown → Confirmed
/// Waiting → Cancelled → Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Waiting,
    ShuttingDown,
    Confirmed,
    Cancelled,
    Done,
}

impl WatcherState {
    fn allows(self, next: WatcherState) -> bool {
        matches!(
            (self, next),
            (WatcherState::Waiting, WatcherState::ShuttingDown)
                | (WatcherState::ShuttingDown, WatcherState::Confirmed)
                | (WatcherState::Waiting, WatcherState::Cancelled)
                | (WatcherState::Cancelled, WatcherState::Done)
        )
    }

    fn advance(self, next: WatcherState) -> WatcherState {
        debug_assert!(self.allows(next), "invalid watcher transition {self:?} -> {next:?}");
        tracing::debug!(from = ?self, to = ?next, "Signal watcher transition");
        next
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, WatcherState::Confirmed | WatcherState::Done)
    }
}

/// How a watcher run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A signal arrived and a stop was attempted.
    ShutDown {
        signal: TerminationSignal,
        stop: Result<(), StopError>,
    },
    /// The shared context finished first; no stop was attempted.
    Cancelled(CancelReason),
}

impl WatchOutcome {
    /// Terminal state reached by the watcher.
    pub fn final_state(&self) -> WatcherState {
        match self {
            WatchOutcome::ShutDown { .. } => WatcherState::Confirmed,
            WatchOutcome::Cancelled(_) => WatcherState::Done,
        }
    }
}

/// Waits for a termination signal and drives the server's graceful stop.
#[derive(Debug, Clone)]
pub struct SignalWatcher<S> {
    server: S,
    shutdown_timeout: Duration,
}

impl<S: Server> SignalWatcher<S> {
    pub fn new(server: S) -> Self {
        Self {
            server,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Override the stop deadline.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Run until a signal arrives or `ctx` is done, then confirm.
    pub async fn watch<Src: SignalSource>(
        &self,
        ctx: Context,
        mut signals: Src,
        confirmer: Confirmer,
    ) -> WatchOutcome {
        let state = WatcherState::Waiting;

        let signal = tokio::select! {
            signal = next_signal(&mut signals) => signal,
            _ = ctx.done() => {
                let reason = ctx.err().unwrap_or(CancelReason::Canceled);
                let state = state.advance(WatcherState::Cancelled);
                tracing::info!(reason = %reason, "Context done, signal watcher exiting");
                confirmer.confirm();
                state.advance(WatcherState::Done);
                return WatchOutcome::Cancelled(reason);
            }
        };

        tracing::info!(
            signal = %signal,
            timeout_secs = self.shutdown_timeout.as_secs_f64(),
            "Termination signal received, shutting down"
        );
        let state = state.advance(WatcherState::ShuttingDown);

        let stop = self.stop_server().await;
        if let Err(e) = &stop {
            tracing::error!(
                error = %e,
                timeout = e.is_timeout(),
                "Could not gracefully shutdown the server"
            );
        }

        confirmer.confirm();
        state.advance(WatcherState::Confirmed);
        WatchOutcome::ShutDown { signal, stop }
    }

    async fn stop_server(&self) -> Result<(), StopError> {
        let deadline = Context::with_timeout(self.shutdown_timeout);
        self.server.set_keep_alives_enabled(false);

        match tokio::time::timeout(self.shutdown_timeout, self.server.stop(deadline)).await {
            Ok(result) => result,
            Err(_) => Err(StopError::DeadlineExceeded(self.shutdown_timeout)),
        }
    }
}

/// Next signal; an exhausted source never resolves.
async fn next_signal<Src: SignalSource>(signals: &mut Src) -> TerminationSignal {
    match signals.recv().await {
        Some(signal) => signal,
        None => {
            tracing::warn!("Signal source closed, waiting on context only");
            std::future::pending().await
        }
    }
}
