//! Tracing initialization for `teamctl`.
//!
//! Human-readable logs to stderr, filtered by `RUST_LOG` or the configured
//! level. The library crates only emit events; this is the one place a
//! subscriber is installed.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// Call this once at startup, before any `tracing` events are emitted.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
