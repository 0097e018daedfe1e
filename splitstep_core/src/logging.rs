//! Logging infrastructure for Splitstep.
//!
//! Logs go to stderr so they never interleave with a countdown rendered on
//! stdout. RUST_LOG, when set, always wins over the level chosen here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when neither RUST_LOG nor `--verbose` is given
pub const DEFAULT_LEVEL: &str = "warn";

/// Install the global subscriber at [`DEFAULT_LEVEL`].
pub fn init() {
    init_with_level(DEFAULT_LEVEL)
}

/// Install the global subscriber, filtering at `default_level` (one of
/// trace, debug, info, warn, error) unless RUST_LOG overrides it.
///
/// Must be called at most once per process.
pub fn init_with_level(default_level: &str) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_level),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Route debug-level logs through the test harness's captured output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
