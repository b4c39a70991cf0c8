//! authsync - drive a bearer-token session from the terminal.
//!
//! Each invocation loads the configured credential store, runs one lifecycle
//! operation against the backend, and prints the resulting session.

mod commands;
mod render;

use std::io;
use std::path::Path;
use std::process::ExitCode;

use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authsync_core::Config;

use commands::Command;

/// Log file name inside the cache directory
const LOG_FILE: &str = "authsync.log";

const USAGE: &str = "\
Usage: authsync <command>

Commands:
  login [email]                    Log in and persist the token pair
  register <username> <email>      Create an account (does not log in)
  whoami                           Resume the stored session and show the user
  update [--username U] [--email E] [--avatar PATH|URL] [--password]
                                   Update the current user's profile
  logout                           Forget the session and stored tokens
  claims                           Decode the stored access token
  watch                            Print every session snapshot while resuming

Environment:
  AUTHSYNC_API_URL, AUTHSYNC_CREDENTIAL_BACKEND, AUTHSYNC_PASSWORD, RUST_LOG";

/// Non-blocking writer appending to the log file in `dir`.
/// Buffered lines reach the file only once the guard is dropped.
fn log_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(dir)
        .ok()?;
    Some(tracing_appender::non_blocking(appender))
}

/// Initialize the tracing subscriber for logging.
/// Returns the guard that flushes the file writer on drop.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.cache_dir().ok().and_then(|dir| log_writer(&dir)) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config ({}), using defaults", e);
        Config::default()
    });

    let guard = init_tracing(&config);
    info!(api = %config.api_base_url, backend = ?config.credential_backend, "authsync starting");

    let result = commands::run(command, &mut config).await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{:#}", e), "Command failed");
    }
    // Flush the log file before reporting
    drop(guard);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
