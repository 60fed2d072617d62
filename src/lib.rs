//! Graceful HTTP server lifecycle library.
//!
//! Runs an HTTP server next to an OS signal watcher under one cancellable
//! context. Whichever task finishes first brings the other one down, and the
//! process only exits once shutdown has been confirmed.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{Context, Coordinator, Outcome};
