//! Shutdown confirmation for the coordinator.
//!
//! The watcher owns the single [`Confirmer`]; any number of
//! [`ConfirmationWaiter`]s can observe it. `confirm` consumes the producer,
//! so the signal is set at most once.

use tokio::sync::watch;

/// Error observed by a waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    /// The producer went away without confirming.
    #[error("shutdown confirmation dropped before it was signalled")]
    ConfirmationDropped,
}

/// Create a linked producer/consumer pair.
pub fn confirmation() -> (Confirmer, ConfirmationWaiter) {
    let (tx, rx) = watch::channel(false);
    (Confirmer { tx }, ConfirmationWaiter { rx })
}

/// Producer half. Dropping it without calling [`Confirmer::confirm`] wakes
/// waiters with [`ShutdownError::ConfirmationDropped`].
#[derive(Debug)]
pub struct Confirmer {
    tx: watch::Sender<bool>,
}

impl Confirmer {
    /// Signal that shutdown has fully completed.
    pub fn confirm(self) {
        self.tx.send_replace(true);
        tracing::debug!("Shutdown confirmed");
    }
}

/// Consumer half.
#[derive(Debug, Clone)]
pub struct ConfirmationWaiter {
    rx: watch::Receiver<bool>,
}

impl ConfirmationWaiter {
    /// Wait until shutdown is confirmed.
    pub async fn wait(&mut self) -> Result<(), ShutdownError> {
        self.rx
            .wait_for(|confirmed| *confirmed)
            .await
            .map(|_| ())
            .map_err(|_| ShutdownError::ConfirmationDropped)
    }

    /// Check whether shutdown has been confirmed without waiting.
    pub fn is_confirmed(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_confirm_wakes_every_waiter() {
        let (confirmer, waiter) = confirmation();
        let mut first = waiter.clone();
        let mut second = waiter.clone();

        let a = tokio::spawn(async move { first.wait().await });
        let b = tokio::spawn(async move { second.wait().await });

        assert!(!waiter.is_confirmed());
        confirmer.confirm();

        assert_eq!(a.await.unwrap(), Ok(()));
        assert_eq!(b.await.unwrap(), Ok(()));
        assert!(waiter.is_confirmed());
    }

    #[tokio::test]
    async fn test_late_waiter_sees_confirmation() {
        let (confirmer, mut waiter) = confirmation();
        confirmer.confirm();

        tokio::time::timeout(Duration::from_secs(1), waiter.wait())
            .await
            .expect("confirmed waiter must not block")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_confirmer_reports_error() {
        let (confirmer, mut waiter) = confirmation();
        drop(confirmer);

        assert_eq!(waiter.wait().await, Err(ShutdownError::ConfirmationDropped));
        assert!(!waiter.is_confirmed());
    }
}
