//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (lifecycle transitions, server state, request spans)
//!     → logging.rs (fmt subscriber, EnvFilter)
//! ```

pub mod logging;

pub use logging::init_logging;
