//! Logging setup for provider binaries.
//!
//! The poller logs through `tracing`: one span per wait (carrying the
//! operation name), `debug` for every pending round, `info` when the target is
//! reached and `warn` for retried errors, failure states and timeouts. All
//! output goes to **stderr**, since stdout belongs to the plugin handshake.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `btp_reconcile=debug`)
//!
//! ```bash
//! # Follow every poll round
//! RUST_LOG=btp_reconcile=debug ./terraform-provider-btp
//! ```

use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Log level used when `RUST_LOG` is unset.
pub const DEFAULT_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer::<S>()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Like [`init_logging`], with a custom level for when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful in tests, where several cases may race to install a subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LEVEL))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, and installing
    // one here would leak into every other test in the binary.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("btp_reconcile=debug").is_ok());
        assert!(EnvFilter::try_new("warn,btp_reconcile::poller=debug").is_ok());
    }
}
