//! # Error Handling Module
//!
//! Error types for address resolution and connection picking, built on `thiserror`.
//!
//! Errors fall into two groups:
//! - Background errors (discovery queries, address-set delivery) are logged and
//!   counted by the task that hit them. They never stop the resolver.
//! - Call-path errors (`NoConnectionAvailable`) are returned synchronously to
//!   the code asking for a connection.

use thiserror::Error;

/// Main result type used throughout the crate
pub type TrafficResult<T> = Result<T, TrafficError>;

/// Error types for the resolver and the picker
///
/// The `#[error("...")]` attribute from `thiserror` implements `Display`
/// with the given message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrafficError {
    /// Configuration-related errors (bad target URL, invalid config file, etc.)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A blocking query against the discovery backend failed
    #[error("Discovery query failed for service {service}: {message}")]
    DiscoveryQueryFailed { service: String, message: String },

    /// The picker had no ready connection to hand out
    #[error("No connection available")]
    NoConnectionAvailable,

    /// The connection-management runtime rejected an address-set update
    #[error("Address update rejected by consumer: {message}")]
    ConsumerUpdateFailed { message: String },

    /// I/O errors (reading config files, etc.)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// HTTP client errors when talking to the Consul agent
    #[error("HTTP client error: {message}")]
    HttpClient { message: String },
}

impl TrafficError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a discovery error for the given service
    pub fn discovery<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::DiscoveryQueryFailed {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a consumer update error with a custom message
    pub fn consumer_update<S: Into<String>>(message: S) -> Self {
        Self::ConsumerUpdateFailed {
            message: message.into(),
        }
    }

    /// Check if this error is transient
    ///
    /// Background loops retry transient errors; everything else is a caller
    /// or configuration problem.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryQueryFailed { .. }
                | Self::HttpClient { .. }
                | Self::Io { .. }
                | Self::ConsumerUpdateFailed { .. }
        )
    }

    /// Get a string representation of the error type for logs and metric labels
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::DiscoveryQueryFailed { .. } => "discovery_query_failed",
            Self::NoConnectionAvailable => "no_connection_available",
            Self::ConsumerUpdateFailed { .. } => "consumer_update_failed",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
            Self::HttpClient { .. } => "http_client_error",
        }
    }
}

impl From<std::io::Error> for TrafficError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrafficError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for TrafficError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for TrafficError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpClient {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for TrafficError {
    fn from(err: url::ParseError) -> Self {
        Self::config(format!("Invalid target URL: {}", err))
    }
}

/// Convenience macro for creating configuration errors
///
/// Usage: `config_error!("Invalid limit: {}", raw)`
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::core::error::TrafficError::config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(TrafficError::discovery("svc", "connection refused").is_retryable());
        assert!(TrafficError::consumer_update("closed").is_retryable());
        assert!(!TrafficError::NoConnectionAvailable.is_retryable());
        assert!(!TrafficError::config("bad url").is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = TrafficError::discovery("billing", "timed out");
        assert_eq!(
            err.to_string(),
            "Discovery query failed for service billing: timed out"
        );
        assert_eq!(err.error_type(), "discovery_query_failed");
        assert_eq!(
            TrafficError::NoConnectionAvailable.to_string(),
            "No connection available"
        );
    }

    #[test]
    fn test_config_error_macro() {
        let err = config_error!("Invalid limit: {}", "abc");
        assert_eq!(err, TrafficError::config("Invalid limit: abc"));
    }
}
