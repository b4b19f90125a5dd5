//! Logging Initialisation
//!
//! Installs a `tracing` subscriber with an env filter. `RUST_LOG` wins over
//! the configured level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialise the global subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn,reqwest=warn", level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
