//! Development-time tracing subscriber.
//!
//! The library only emits `tracing` events; nothing is printed unless the embedding
//! program installs a subscriber. [`init`] is a ready-made one for binaries and demos.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global subscriber writing compact lines to stderr.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset, which shows retries, wait timeouts and
/// failed convergences.
///
/// # Example
/// ```bash
/// RUST_LOG=convergent=debug cargo run --example converge_in_memory --features logging
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
