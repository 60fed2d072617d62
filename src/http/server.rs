//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Create the Axum Router with its handlers
//! - Wire up middleware (tracing, timeout, request ID, keep-alive switch)
//! - Bind the listener and serve until stopped
//! - Drain connections on a graceful stop, bounded by a deadline

use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::keep_alive::{self, KeepAlive};
use crate::lifecycle::{Context, Server, StopError};

/// Error returned by the serve loop.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("invalid listen address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Observable state of the serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// `run` has not bound a listener yet.
    Idle,
    /// Accepting connections on the given address.
    Listening(SocketAddr),
    /// The serve loop returned.
    Stopped,
}

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    keep_alive: KeepAlive,
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    keep_alive: bool,
}

struct Inner {
    bind_address: String,
    request_timeout: Duration,
    keep_alive: KeepAlive,
    shutdown: CancellationToken,
    state: watch::Sender<ServerState>,
}

/// HTTP server with a graceful stop procedure.
///
/// Cloning yields another handle to the same server, so the runner task
/// and the signal watcher can share it.
#[derive(Clone)]
pub struct HttpServer {
    inner: Arc<Inner>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ServerConfig) -> Self {
        let (state, _) = watch::channel(ServerState::Idle);
        Self {
            inner: Arc::new(Inner {
                bind_address: config.listener.bind_address.clone(),
                request_timeout: Duration::from_secs(config.http.request_timeout_secs),
                keep_alive: KeepAlive::new(),
                shutdown: CancellationToken::new(),
                state,
            }),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self) -> Router {
        let state = AppState {
            keep_alive: self.inner.keep_alive.clone(),
        };

        Router::new()
            .route("/", get(index))
            .route("/healthz", get(health))
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                self.inner.keep_alive.clone(),
                keep_alive::close_when_disabled,
            ))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(self.inner.request_timeout)),
            )
    }

    /// Bind the configured address and serve until stopped.
    ///
    /// Returns `Ok(())` when the listener was closed by [`Server::stop`].
    pub async fn run(&self) -> Result<(), ServeError> {
        // Also marks the server stopped when this future is dropped mid-serve.
        let _stopped = MarkStopped(&self.inner.state);
        let result = self.serve().await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "HTTP server failed");
        }
        result
    }

    async fn serve(&self) -> Result<(), ServeError> {
        let addr: SocketAddr =
            self.inner
                .bind_address
                .parse()
                .map_err(|source| ServeError::InvalidAddress {
                    addr: self.inner.bind_address.clone(),
                    source,
                })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(ServeError::Serve)?;

        self.inner.state.send_replace(ServerState::Listening(local_addr));
        tracing::info!(address = %local_addr, "HTTP server listening");

        let shutdown = self.inner.shutdown.clone();
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move { shutdown.cancelled_owned().await })
            .await
            .map_err(ServeError::Serve)?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Subscribe to serve-loop state changes.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.inner.state.subscribe()
    }

    /// Wait until the server is listening. `None` if it stopped first.
    pub async fn listening(&self) -> Option<SocketAddr> {
        let mut state = self.state();
        let current = state
            .wait_for(|s| *s != ServerState::Idle)
            .await
            .ok()
            .map(|s| *s);
        match current {
            Some(ServerState::Listening(addr)) => Some(addr),
            _ => None,
        }
    }

    /// Whether keep-alives are currently enabled.
    pub fn keep_alives_enabled(&self) -> bool {
        self.inner.keep_alive.is_enabled()
    }
}

impl Server for HttpServer {
    type Error = ServeError;

    async fn start(&self) -> Result<(), ServeError> {
        self.run().await
    }

    async fn stop(&self, deadline: Context) -> Result<(), StopError> {
        let started = Instant::now();
        tracing::debug!(budget = ?deadline.remaining(), "Draining HTTP server");
        self.inner.shutdown.cancel();

        let mut state = self.state();
        if *state.borrow_and_update() == ServerState::Idle {
            tracing::debug!("Stop requested before the server started listening");
            return Ok(());
        }

        tokio::select! {
            stopped = async { state.wait_for(|s| *s == ServerState::Stopped).await.map(|_| ()) } => {
                stopped.map_err(|_| StopError::Failed("server state channel closed".into()))?;
                tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "HTTP server drained");
                Ok(())
            }
            _ = deadline.done() => Err(StopError::DeadlineExceeded(started.elapsed())),
        }
    }

    fn set_keep_alives_enabled(&self, enabled: bool) {
        self.inner.keep_alive.set_enabled(enabled);
    }
}

struct MarkStopped<'a>(&'a watch::Sender<ServerState>);

impl Drop for MarkStopped<'_> {
    fn drop(&mut self) {
        self.0.send_replace(ServerState::Stopped);
    }
}

async fn index() -> &'static str {
    "ok\n"
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let keep_alive = state.keep_alive.is_enabled();
    Json(HealthStatus {
        status: if keep_alive { "serving" } else { "draining" },
        keep_alive,
    })
}
