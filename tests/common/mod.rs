//! Shared utilities for lifecycle integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use graceful_server::config::ServerConfig;
use graceful_server::lifecycle::{Context, Server, StopError};
use tokio_util::sync::CancellationToken;

/// How the mock serve loop behaves.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum StartBehavior {
    /// Serve until `stop` is called.
    ServeUntilStopped,
    /// Fail immediately, like a port that is already taken.
    FailToBind,
    /// Return `Ok` on its own after the given delay.
    ExitAfter(Duration),
}

#[derive(Debug, thiserror::Error)]
#[error("failed to bind 127.0.0.1:9001: address already in use")]
pub struct MockBindError;

/// In-memory stand-in for the HTTP server.
#[derive(Clone)]
pub struct MockServer {
    behavior: StartBehavior,
    stuck_drain: bool,
    stopped: CancellationToken,
    pub stop_calls: Arc<AtomicUsize>,
    pub keep_alives: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockServer {
    pub fn new(behavior: StartBehavior) -> Self {
        Self {
            behavior,
            stuck_drain: false,
            stopped: CancellationToken::new(),
            stop_calls: Arc::new(AtomicUsize::new(0)),
            keep_alives: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make `stop` hang and leave the serve loop running, like a drain
    /// blocked on a connection that never finishes its request.
    pub fn with_stuck_drain(mut self) -> Self {
        self.stuck_drain = true;
        self
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn keep_alives_enabled(&self) -> bool {
        self.keep_alives.load(Ordering::SeqCst)
    }
}

impl Server for MockServer {
    type Error = MockBindError;

    async fn start(&self) -> Result<(), MockBindError> {
        match self.behavior {
            StartBehavior::ServeUntilStopped => {
                self.stopped.cancelled().await;
                Ok(())
            }
            StartBehavior::FailToBind => Err(MockBindError),
            StartBehavior::ExitAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    async fn stop(&self, _deadline: Context) -> Result<(), StopError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.stuck_drain {
            return std::future::pending().await;
        }
        self.stopped.cancel();
        Ok(())
    }

    fn set_keep_alives_enabled(&self, enabled: bool) {
        self.keep_alives.store(enabled, Ordering::SeqCst);
    }
}

/// Configuration bound to an ephemeral loopback port.
#[allow(dead_code)]
pub fn ephemeral_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.shutdown.timeout_secs = 5;
    config
}

/// Configuration bound to an exact address.
#[allow(dead_code)]
pub fn config_for(addr: SocketAddr) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = addr.to_string();
    config
}

/// HTTP client that never reuses or proxies connections.
#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
