//! Log subscriber installation
//!
//! Logs go to stderr so that command output on stdout stays parseable.
//! One line per event, either human-readable or JSON.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter directive used when neither `RUST_LOG` nor the configured filter
/// parses.
pub const FALLBACK_FILTER: &str = "info";

/// Build the filter: `RUST_LOG` first, then the configured directive.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber. Returns `false` when one was already set,
/// which leaves the existing subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let registry = tracing_subscriber::registry().with(build_filter(config));
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    installed.is_ok()
}
