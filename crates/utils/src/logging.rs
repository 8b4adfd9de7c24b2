//! Tracing initialisation shared by the binaries.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a global subscriber honouring `RUST_LOG`, falling back to `default_directive`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
