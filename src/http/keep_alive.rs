//! Keep-alive switch for the HTTP server.
//!
//! Hyper closes a connection after writing a response that carries
//! `Connection: close`, so turning keep-alives off is done by stamping that
//! header on every response sent after the switch flips.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Shared keep-alive flag. Enabled by default.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    enabled: Arc<AtomicBool>,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            tracing::debug!(enabled, "Keep-alives toggled");
        }
    }
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware: ask the client to close the connection once keep-alives are off.
pub async fn close_when_disabled(
    State(keep_alive): State<KeepAlive>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    if !keep_alive.is_enabled() {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}
