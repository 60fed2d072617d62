//! graceful-server
//!
//! Starts the HTTP server and the signal watcher, then waits for both to
//! finish before exiting.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────── Coordinator ───────────────────────────┐
//!                 │                                                                     │
//!                 │   Context ──────────────┬───────────────────────┐                   │
//!                 │                         ▼                       ▼                   │
//!                 │                  ┌─────────────┐        ┌───────────────┐           │
//!   TCP clients ──┼────────────────▶│ HTTP server │◀─stop──│ signal watcher│◀── SIGHUP │
//!                 │                  │  (runner)   │        │               │◀── SIGQUIT│
//!                 │                  └──────┬──────┘        └───────┬───────┘◀── SIGTERM│
//!                 │                         │                       │        ◀── SIGINT │
//!                 │                         ▼                       ▼                   │
//!                 │                     task group join      confirmation               │
//!                 │                         └──────────┬────────────┘                   │
//!                 │                                    ▼                                │
//!                 │                          "all server shutdown"                      │
//!                 └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use graceful_server::config::{load_config, ServerConfig};
use graceful_server::lifecycle::{Coordinator, TerminationSignals};
use graceful_server::observability::init_logging;
use graceful_server::HttpServer;

#[derive(Parser)]
#[command(name = "graceful-server")]
#[command(version, about = "HTTP server with coordinated graceful shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        shutdown_timeout_secs = config.shutdown.timeout_secs,
        "graceful-server starting"
    );

    let signals = TerminationSignals::register()?;
    let server = HttpServer::new(&config);

    let outcome = Coordinator::new(server)
        .with_shutdown_timeout(config.shutdown.timeout())
        .run(signals)
        .await;

    println!("all server shutdown");
    Ok(outcome.exit_code())
}
