//! Console logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to the
//! whole crate. Safe to call more than once (later calls are no-ops), so
//! tests and the CLI can both initialize freely.

use tracing_subscriber::EnvFilter;

pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
