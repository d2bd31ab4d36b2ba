//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Without it, `crate_name` is logged at
/// `default_level` and everything else at `warn`.
///
/// Calling this more than once is harmless: later calls are ignored.
pub fn setup_logger(crate_name: &str, default_level: &str) {
    let target = crate_name.replace('-', "_");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{target}={default_level},tower_http=info")));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
