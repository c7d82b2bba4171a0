//! Logging setup: a `tracing` subscriber writing to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the log filter: RUST_LOG when set and valid, else `fallback`, else `warn`.
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize compact human-readable logging on stderr, so command output on
/// stdout stays clean.
pub fn init_logging(fallback_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter(fallback_level))
        .try_init();
}
