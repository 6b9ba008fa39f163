//! Process-wide `tracing` setup shared by `theta-cli` and any embedder that
//! wants the pool's logs without assembling its own subscriber.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`
/// (default `info`). Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
