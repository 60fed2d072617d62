//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator (coordinator.rs):
//!     Create context → Spawn runner + watcher (group.rs) → Join → Await confirmation → Exit
//!
//! Watcher (signals.rs):
//!     SIGHUP/SIGQUIT/SIGTERM/SIGINT → Disable keep-alives → Bounded stop → Confirm
//!     Context done → Log reason → Confirm
//!
//! Confirmation (shutdown.rs):
//!     Single producer (watcher) → any number of waiters (coordinator)
//! ```
//!
//! # Design Decisions
//! - One context per run, passed explicitly to every task
//! - First task failure cancels the context; every task is still joined
//! - Only the watcher ever calls stop, and at most once
//! - Shutdown has a timeout: the stop deadline is independent of the shared context

pub mod context;
pub mod coordinator;
pub mod group;
pub mod server;
pub mod shutdown;
pub mod signals;

pub use context::{CancelReason, Context};
pub use coordinator::{Coordinator, Outcome};
pub use group::{GroupError, TaskGroup};
pub use server::{Server, StopError};
pub use shutdown::{confirmation, ConfirmationWaiter, Confirmer, ShutdownError};
pub use signals::{
    SignalSource, SignalWatcher, TerminationSignal, TerminationSignals, WatchOutcome,
    WatcherState, DEFAULT_SHUTDOWN_TIMEOUT,
};
