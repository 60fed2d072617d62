//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → keep_alive.rs (Connection: close once keep-alives are off)
//!     → handler
//! ```

pub mod keep_alive;
pub mod server;

pub use keep_alive::KeepAlive;
pub use server::{HttpServer, ServeError, ServerState};
