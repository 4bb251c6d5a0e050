//! Diagnostic logging for processes run by the daemon
//!
//! The daemon owns stdout. Diagnostics must go to stderr or they would be
//! read as protocol messages.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that writes to stderr
///
/// `RUST_LOG` takes precedence over `default_directive` when it is set.
/// Returns `false` if a global subscriber was already installed.
pub fn init_stderr_logging(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .is_ok()
}
