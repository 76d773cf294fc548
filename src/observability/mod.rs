// Logging configuration
pub mod config;

// Metric names and descriptions
pub mod metrics;

// Structured logging
pub mod logging;

pub use self::config::{LogConfig, LogFormat};
pub use self::logging::init_logging;
pub use self::metrics::describe_metrics;
