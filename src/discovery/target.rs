//! # Watch Targets
//!
//! A `Target` describes one blocking query: which service to watch on which
//! Consul agent, and how to filter it. Targets are written as URLs:
//!
//! ```text
//! consul://[user:password@]127.0.0.1:8500/my-service?wait=14s&tag=primary&healthy=true
//! ```
//!
//! Supported query options: `wait`, `timeout`, `max-backoff` (humantime
//! durations), `tag`, `near`, `dc`, `token`, `limit`, `healthy`,
//! `allow-stale`, `require-consistent`, `tls` and `insecure`. `tls=true`
//! talks to the agent over HTTPS; `insecure=true` additionally skips
//! certificate verification and is only accepted together with TLS.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config_error;
use crate::core::error::{TrafficError, TrafficResult};
use crate::core::types::QueryOptions;

/// URL scheme handled by this resolver
pub const SCHEME: &str = "consul";

/// Agent address used when none is configured
pub const DEFAULT_AGENT_ADDR: &str = "127.0.0.1:8500";

/// Immutable description of a watched service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Target {
    /// Consul agent `host[:port]`
    pub addr: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub service: String,
    /// Blocking query wait budget; zero lets the agent pick its default
    #[serde(with = "humantime_serde")]
    pub wait: Duration,
    /// HTTP client timeout; zero disables it
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Upper bound on the retry delay after a failed query
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    pub tag: String,
    pub near: String,
    /// Maximum number of addresses forwarded; zero means unlimited
    pub limit: usize,
    pub healthy: bool,
    /// Reach the agent over HTTPS
    pub tls: bool,
    /// Skip certificate verification; requires TLS
    pub insecure: bool,
    pub token: String,
    pub dc: String,
    pub allow_stale: bool,
    pub require_consistent: bool,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            addr: DEFAULT_AGENT_ADDR.to_string(),
            user: None,
            password: None,
            service: String::new(),
            wait: Duration::ZERO,
            timeout: Duration::ZERO,
            max_backoff: Duration::from_secs(1),
            tag: String::new(),
            near: String::new(),
            limit: 0,
            healthy: false,
            tls: false,
            insecure: false,
            token: String::new(),
            dc: String::new(),
            allow_stale: false,
            require_consistent: false,
        }
    }
}

impl Target {
    /// Parse a `consul://` target URL
    pub fn from_url(raw: &str) -> TrafficResult<Self> {
        let url = Url::parse(raw)?;
        if url.scheme() != SCHEME {
            return Err(config_error!(
                "Unsupported scheme '{}' in target {}, expected '{}'",
                url.scheme(),
                raw,
                SCHEME
            ));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| config_error!("Missing Consul agent address in target {}", raw))?;
        let addr = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let service = url.path().trim_matches('/').to_string();
        if service.is_empty() {
            return Err(config_error!("Missing service name in target {}", raw));
        }

        let mut target = Self {
            addr,
            service,
            user: Some(url.username().to_string()).filter(|u| !u.is_empty()),
            password: url.password().map(str::to_string),
            ..Self::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "wait" => target.wait = parse_duration(&key, &value)?,
                "timeout" => target.timeout = parse_duration(&key, &value)?,
                "max-backoff" => target.max_backoff = parse_duration(&key, &value)?,
                "tag" => target.tag = value.into_owned(),
                "near" => target.near = value.into_owned(),
                "dc" => target.dc = value.into_owned(),
                "token" => target.token = value.into_owned(),
                "limit" => {
                    target.limit = value
                        .parse()
                        .map_err(|e| config_error!("Invalid limit '{}': {}", value, e))?
                }
                "healthy" => target.healthy = parse_bool(&key, &value)?,
                "tls" => target.tls = parse_bool(&key, &value)?,
                "insecure" => target.insecure = parse_bool(&key, &value)?,
                "allow-stale" => target.allow_stale = parse_bool(&key, &value)?,
                "require-consistent" => target.require_consistent = parse_bool(&key, &value)?,
                other => {
                    return Err(config_error!(
                        "Unknown option '{}' in target {}",
                        other,
                        raw
                    ))
                }
            }
        }

        target.validate()?;
        Ok(target)
    }

    /// Check invariants that URL parsing alone cannot enforce
    pub fn validate(&self) -> TrafficResult<()> {
        if self.service.is_empty() {
            return Err(TrafficError::config("Target service name must not be empty"));
        }
        if self.addr.is_empty() {
            return Err(TrafficError::config("Target agent address must not be empty"));
        }
        if self.insecure && !self.uses_tls() {
            return Err(TrafficError::config("insecure requires tls or an https:// agent address"));
        }
        if self.allow_stale && self.require_consistent {
            return Err(TrafficError::config(
                "allow-stale and require-consistent are mutually exclusive",
            ));
        }
        Ok(())
    }

    pub fn uses_tls(&self) -> bool {
        self.tls || self.addr.starts_with("https://")
    }

    /// Base URL of the agent HTTP API
    pub fn agent_url(&self) -> String {
        if self.addr.starts_with("http://") || self.addr.starts_with("https://") {
            self.addr.trim_end_matches('/').to_string()
        } else if self.tls {
            format!("https://{}", self.addr)
        } else {
            format!("http://{}", self.addr)
        }
    }

    /// Options for the next blocking query
    pub fn query_options(&self, wait_index: u64) -> QueryOptions {
        QueryOptions {
            near: self.near.clone(),
            datacenter: self.dc.clone(),
            wait_time: self.wait,
            allow_stale: self.allow_stale,
            require_consistent: self.require_consistent,
            wait_index,
        }
    }
}

impl std::str::FromStr for Target {
    type Err = TrafficError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_url(s)
    }
}

fn parse_duration(key: &str, value: &str) -> TrafficResult<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| config_error!("Invalid {} '{}': {}", key, value, e))
}

fn parse_bool(key: &str, value: &str) -> TrafficResult<bool> {
    value
        .parse()
        .map_err(|e| config_error!("Invalid {} '{}': {}", key, value, e))
}
