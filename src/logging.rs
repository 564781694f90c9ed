//! Logging setup for the provider binary.
//!
//! All output goes to **stderr**: stdout carries the handshake line that the
//! host parses, so nothing else may be printed there.
//!
//! Filtering follows `RUST_LOG`. When it is unset, `HEMMER_LOG_LEVEL` is used
//! as the default level, falling back to `info`.
//!
//! ```bash
//! # Trace every REST call the provider makes
//! RUST_LOG=hemmer_provider_dataarts=debug ./hemmer-provider-dataarts
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted for the default level when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "HEMMER_LOG_LEVEL";

fn default_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_level.to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the global subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize the global subscriber with `default_level` used when neither
/// `RUST_LOG` nor `HEMMER_LOG_LEVEL` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(default_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Like [`init_logging`], but returns `false` instead of panicking when a
/// subscriber is already installed. Useful from tests.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(default_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
