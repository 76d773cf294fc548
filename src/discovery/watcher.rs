//! # Discovery Poller
//!
//! Long-running loop issuing blocking health queries for one target. Each
//! successful result is normalized and, if it changed, sent downstream. Failed
//! queries are logged and retried after a capped exponential backoff. The loop
//! only ends when its cancellation token fires or the downstream receiver is
//! gone.

use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::core::types::AddressList;
use crate::discovery::consul::ServiceQuery;
use crate::discovery::normalize::{normalize, ChangeFilter};
use crate::discovery::target::Target;
use crate::observability::metrics::{DISCOVERY_QUERIES, DISCOVERY_QUERY_ERRORS, RESOLVED_ADDRESSES};

/// First retry delay after a failed query
const BASE_BACKOFF: Duration = Duration::from_millis(10);

/// Capped exponential backoff with jitter
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    attempt: u32,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub(crate) fn new(max: Duration) -> Self {
        Self {
            attempt: 0,
            base: BASE_BACKOFF,
            max: max.max(BASE_BACKOFF),
        }
    }

    /// Delay before the next retry, within 75%-100% of the exponential step
    pub(crate) fn next_delay(&mut self) -> Duration {
        let step = self
            .base
            .saturating_mul(2u32.saturating_pow(self.attempt))
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        let jitter_ms = fastrand::u64(0..=step.as_millis() as u64 / 4);
        step.saturating_sub(Duration::from_millis(jitter_ms))
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Index to send with the next query
///
/// An index that moves backwards means the agent's state was reset; start
/// over from 0 instead of blocking on an index that will never be reached.
pub(crate) fn next_index(previous: u64, reported: u64) -> u64 {
    if reported < previous {
        0
    } else {
        reported
    }
}

/// Watch `target` until `cancel` fires, sending changed address lists to `out`
pub async fn watch_service(
    cancel: CancellationToken,
    query: Arc<dyn ServiceQuery>,
    target: Target,
    out: mpsc::Sender<AddressList>,
) {
    let mut last_index = 0u64;
    let mut filter = ChangeFilter::new();
    let mut backoff = Backoff::new(target.max_backoff);

    info!(service = %target.service, agent = %target.addr, "Starting Consul watch");

    loop {
        let options = target.query_options(last_index);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = query.service(&target.service, &target.tag, target.healthy, &options) => result,
        };
        counter!(DISCOVERY_QUERIES, "service" => target.service.clone()).increment(1);

        let (entries, meta) = match result {
            Ok(found) => found,
            Err(err) => {
                counter!(DISCOVERY_QUERY_ERRORS, "service" => target.service.clone()).increment(1);
                let delay = backoff.next_delay();
                error!(
                    service = %target.service,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Consul health query failed"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };

        backoff.reset();
        let index = next_index(last_index, meta.last_index);
        if index == 0 && last_index > 0 {
            warn!(service = %target.service, previous = last_index, reported = meta.last_index, "Consul index went backwards, resetting");
            // Resync the runtime with the restarted agent even if nothing changed
            filter.reset();
        }
        last_index = index;

        let Some(list) = filter.observe(normalize(&entries, target.limit)) else {
            trace!(service = %target.service, index = last_index, "Address list unchanged");
            continue;
        };

        gauge!(RESOLVED_ADDRESSES, "service" => target.service.clone()).set(list.len() as f64);
        debug!(
            service = %target.service,
            index = last_index,
            addresses = ?list.addrs(),
            "Address list changed"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = out.send(list) => {
                if sent.is_err() {
                    info!(service = %target.service, "Address receiver closed, stopping watch");
                    break;
                }
            }
        }
    }

    info!(service = %target.service, "Consul watch stopped");
}
