//! The server collaborator driven by the lifecycle tasks.

use std::future::Future;
use std::time::Duration;

use crate::lifecycle::context::Context;

/// Failure of a graceful stop attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StopError {
    /// Connections were still draining when the deadline passed.
    #[error("graceful shutdown did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// The stop procedure failed for another reason.
    #[error("graceful shutdown failed: {0}")]
    Failed(String),
}

impl StopError {
    /// Whether this is a timeout-class failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StopError::DeadlineExceeded(_))
    }
}

/// A long-running server with a graceful stop procedure.
///
/// `start` runs on the runner task; `stop` and `set_keep_alives_enabled`
/// are called from the watcher, so implementations are shared handles.
pub trait Server: Clone + Send + Sync + 'static {
    /// Error returned when the server fails to bind or serve.
    type Error: std::error::Error + Send + 'static;

    /// Serve until stopped. `Ok(())` means the listener was closed on purpose.
    fn start(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Request a graceful drain bounded by `deadline`.
    fn stop(&self, deadline: Context) -> impl Future<Output = Result<(), StopError>> + Send;

    /// Toggle connection reuse for responses sent from now on.
    fn set_keep_alives_enabled(&self, enabled: bool);
}
