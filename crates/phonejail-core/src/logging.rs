//! Tracing subscriber setup for hosts embedding the core.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::storage::LoggingConfig;

const FALLBACK_FILTER: &str = "phonejail_core=info";

/// Build the filter: `RUST_LOG` wins, then the configured filter.
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install a fmt subscriber. Returns `false` when one was already set,
/// so calling this twice is harmless.
pub fn init(config: &LoggingConfig) -> bool {
    tracing_subscriber::registry()
        .with(filter(config))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
