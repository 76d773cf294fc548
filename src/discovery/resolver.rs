//! # Consul Resolver
//!
//! Owns the background tasks for one watched target: the poller feeding a
//! single-slot channel, and the propagator draining it into the runtime's
//! `AddressSink`. Both share one cancellation token, so `close()` (or
//! dropping the resolver) tears down the in-flight query and any pending
//! delivery together.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::core::error::TrafficResult;
use crate::discovery::consul::{ConsulClient, ServiceQuery};
use crate::discovery::propagator::{propagate, AddressSink};
use crate::discovery::target::{Target, SCHEME};
use crate::discovery::watcher::watch_service;

/// Capacity of the poller -> propagator channel; only the newest list matters
const UPDATE_BUFFER: usize = 1;

/// Running resolver for one target
pub struct ConsulResolver {
    target: Target,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConsulResolver {
    /// Spawn the poller and propagator on the current tokio runtime
    pub fn start(target: Target, query: Arc<dyn ServiceQuery>, sink: Arc<dyn AddressSink>) -> Self {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);

        let watcher = tokio::spawn(watch_service(cancel.clone(), query, target.clone(), tx));
        let propagator = tokio::spawn(propagate(cancel.clone(), sink, rx));

        info!(service = %target.service, agent = %target.addr, "Consul resolver started");

        Self {
            target,
            cancel,
            tasks: Mutex::new(vec![watcher, propagator]),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Blocking queries already deliver every change, so there is nothing to
    /// trigger here
    pub fn resolve_now(&self) {
        trace!(service = %self.target.service, "resolve_now ignored, watch is continuous");
    }

    /// Stop the background tasks; safe to call more than once
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!(service = %self.target.service, "Closing Consul resolver");
            self.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Close and wait for both background tasks to exit
    pub async fn shutdown(self) {
        self.close();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(service = %self.target.service, error = %e, "Resolver task ended abnormally");
            }
        }
    }
}

impl Drop for ConsulResolver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Creates resolvers for `consul://` target URLs
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsulResolverBuilder;

impl ConsulResolverBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    /// Parse `target_url`, connect to its agent and start watching
    pub fn build(&self, target_url: &str, sink: Arc<dyn AddressSink>) -> TrafficResult<ConsulResolver> {
        let target = Target::from_url(target_url)?;
        self.build_target(target, sink)
    }

    /// Start watching an already parsed target
    pub fn build_target(&self, target: Target, sink: Arc<dyn AddressSink>) -> TrafficResult<ConsulResolver> {
        target.validate()?;
        let client = ConsulClient::new(&target)?;
        Ok(ConsulResolver::start(target, Arc::new(client), sink))
    }
}
