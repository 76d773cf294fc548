//! # Configuration Module
//!
//! Loading of the resolver configuration: the set of `consul://` targets to
//! watch and the logging setup.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support (`CONSUL_TRAFFIC_*`)
//! - Validation of every target URL before anything starts

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{TrafficError, TrafficResult};
use crate::discovery::target::Target;
use crate::observability::config::LogConfig;

/// Top-level configuration
///
/// ```yaml
/// targets:
///   - consul://127.0.0.1:8500/billing?wait=30s&healthy=true
/// logging:
///   level: info
///   format: json
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Target URLs, one resolver each
    pub targets: Vec<String>,

    /// Logging settings
    pub logging: LogConfig,
}

impl TrafficConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> TrafficResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TrafficError::config(format!("Failed to read config file: {}", e)))?;

        let config: TrafficConfig = serde_yaml::from_str(&content)
            .map_err(|e| TrafficError::config(format!("Failed to parse config: {}", e)))?;

        config.finish()
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> TrafficResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TrafficError::config(format!("Failed to read config file: {}", e)))?;

        let config: TrafficConfig = serde_json::from_str(&content)
            .map_err(|e| TrafficError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.finish()
    }

    fn finish(mut self) -> TrafficResult<Self> {
        self.apply_env_overrides()?;
        self.validate()?;
        Ok(self)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// - `CONSUL_TRAFFIC_LOG_LEVEL`
    /// - `CONSUL_TRAFFIC_LOG_FORMAT` (`json` or `text`)
    /// - `CONSUL_TRAFFIC_TARGETS`, comma-separated, replaces the file's list
    pub fn apply_env_overrides(&mut self) -> TrafficResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> TrafficResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("CONSUL_TRAFFIC_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("CONSUL_TRAFFIC_LOG_FORMAT") {
            self.logging.format = format
                .parse()
                .map_err(|e| TrafficError::config(format!("Invalid CONSUL_TRAFFIC_LOG_FORMAT: {}", e)))?;
        }

        if let Some(targets) = lookup("CONSUL_TRAFFIC_TARGETS") {
            self.targets = targets
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> TrafficResult<()> {
        crate::observability::logging::parse_level(&self.logging.level)?;
        self.parsed_targets().map(|_| ())
    }

    /// Parse every target URL
    pub fn parsed_targets(&self) -> TrafficResult<Vec<Target>> {
        self.targets.iter().map(|raw| Target::from_url(raw)).collect()
    }
}
