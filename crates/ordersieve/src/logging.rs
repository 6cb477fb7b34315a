//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber once, preferring `RUST_LOG` over the
/// configured level.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
