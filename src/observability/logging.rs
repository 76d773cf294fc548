//! # Structured Logging
//!
//! Installs the `tracing` subscriber used by the resolver and picker: an
//! `EnvFilter` seeded from the configured level, with either a JSON or a text
//! formatter. `RUST_LOG` directives still apply on top of the configured level.

use tracing::{warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::error::{TrafficError, TrafficResult};
use crate::observability::config::{LogConfig, LogFormat};

/// Map a configured level name to a `tracing` level
pub fn parse_level(level: &str) -> TrafficResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(TrafficError::config(format!("Unknown log level '{}'", other))),
    }
}

/// Install the global subscriber
///
/// Returns `Ok(false)` when another subscriber was already installed, which
/// is left in place.
pub fn init_logging(config: &LogConfig) -> TrafficResult<bool> {
    let level = parse_level(&config.level)?;
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let installed = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .is_ok(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()
            .is_ok(),
    };

    if !installed {
        warn!("Tracing subscriber already initialized, skipping initialization");
    }
    Ok(installed)
}
