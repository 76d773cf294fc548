//! # Consul Query Transport
//!
//! The `ServiceQuery` trait is the seam between the watch loop and the
//! discovery backend. `ConsulClient` implements it against the agent HTTP API
//! (`GET /v1/health/service/<name>`), using blocking-query semantics: the
//! request carries the last observed `index` and a `wait` budget, and the
//! agent holds it until the result changes or the budget runs out.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::debug;

use crate::core::error::{TrafficError, TrafficResult};
use crate::core::types::{QueryMeta, QueryOptions, ServiceEntry};
use crate::discovery::target::Target;

/// Header carrying the blocking-query index on responses
pub const INDEX_HEADER: &str = "x-consul-index";

/// Header carrying the ACL token on requests
pub const TOKEN_HEADER: &str = "x-consul-token";

/// Wait the agent applies to a blocking query sent without `wait`
pub const DEFAULT_BLOCKING_WAIT: Duration = Duration::from_secs(5 * 60);

/// Health query against a discovery backend
#[async_trait]
pub trait ServiceQuery: Send + Sync {
    /// Fetch the instances of `service`, optionally filtered by `tag` and to
    /// passing health checks only
    async fn service(
        &self,
        service: &str,
        tag: &str,
        passing_only: bool,
        options: &QueryOptions,
    ) -> TrafficResult<(Vec<ServiceEntry>, QueryMeta)>;
}

/// HTTP client for the Consul agent health endpoint
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
}

impl ConsulClient {
    /// Build a client for the agent named in `target`
    pub fn new(target: &Target) -> TrafficResult<Self> {
        let mut headers = HeaderMap::new();
        if !target.token.is_empty() {
            let token = HeaderValue::from_str(&target.token)
                .map_err(|e| TrafficError::config(format!("Invalid Consul token: {}", e)))?;
            headers.insert(TOKEN_HEADER, token);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(target.insecure);
        if target.timeout > Duration::ZERO {
            builder = builder.timeout(Self::request_timeout(target.timeout, target.wait));
        }

        let http = builder
            .build()
            .map_err(|e| TrafficError::config(format!("Failed to build Consul client: {}", e)))?;

        Ok(Self {
            http,
            base_url: target.agent_url(),
            user: target.user.clone(),
            password: target.password.clone(),
        })
    }

    /// Per-request deadline: the agent may hold a blocking query for the whole
    /// wait, plus up to 1/16 of it in jitter, before `timeout` starts to count
    fn request_timeout(timeout: Duration, wait: Duration) -> Duration {
        let wait = if wait.is_zero() { DEFAULT_BLOCKING_WAIT } else { wait };
        timeout + wait + wait / 16
    }

    fn query_params(tag: &str, passing_only: bool, options: &QueryOptions) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !tag.is_empty() {
            params.push(("tag", tag.to_string()));
        }
        if passing_only {
            params.push(("passing", "1".to_string()));
        }
        if !options.near.is_empty() {
            params.push(("near", options.near.clone()));
        }
        if !options.datacenter.is_empty() {
            params.push(("dc", options.datacenter.clone()));
        }
        if options.allow_stale {
            params.push(("stale", String::new()));
        }
        if options.require_consistent {
            params.push(("consistent", String::new()));
        }
        if options.wait_index > 0 {
            params.push(("index", options.wait_index.to_string()));
        }
        if options.wait_time > Duration::ZERO {
            params.push(("wait", format!("{}ms", options.wait_time.as_millis())));
        }
        params
    }
}

#[async_trait]
impl ServiceQuery for ConsulClient {
    async fn service(
        &self,
        service: &str,
        tag: &str,
        passing_only: bool,
        options: &QueryOptions,
    ) -> TrafficResult<(Vec<ServiceEntry>, QueryMeta)> {
        let url = format!("{}/v1/health/service/{}", self.base_url, service);
        let params = Self::query_params(tag, passing_only, options);

        let mut request = self.http.get(&url).query(&params);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TrafficError::discovery(service, e.to_string()))?;

        let last_index = match response.headers().get(INDEX_HEADER) {
            Some(raw) => raw
                .to_str()
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| {
                    TrafficError::discovery(service, format!("Malformed {} header: {:?}", INDEX_HEADER, raw))
                })?,
            None => 0,
        };

        let entries: Vec<ServiceEntry> = response
            .json()
            .await
            .map_err(|e| TrafficError::discovery(service, format!("Failed to decode health entries: {}", e)))?;

        debug!(
            service = %service,
            instances = entries.len(),
            last_index,
            "Consul health query returned"
        );

        Ok((entries, QueryMeta { last_index }))
    }
}
